/// True when both lists hold the same identifiers, regardless of order.
/// Works on sorted copies so the caller's lists are left as they are.
pub fn equal_ignoring_order(desired: &[String], observed: &[String]) -> bool {
    if desired.len() != observed.len() {
        return false;
    }

    let mut desired: Vec<&str> = desired.iter().map(String::as_str).collect();
    let mut observed: Vec<&str> = observed.iter().map(String::as_str).collect();
    desired.sort_unstable();
    observed.sort_unstable();

    desired == observed
}
