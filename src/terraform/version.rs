use std::cmp::Ordering;

/// Compare dot-separated version strings numerically.
///
/// Only the first `min(len_a, len_b)` components are compared. When those
/// are equal, the string with fewer components is the smaller one. Returns
/// -1, 0 or 1. A component without leading digits on either side compares
/// as equal, so `1.x` and `1.5` are the same version.
pub fn compare_versions(a: &str, b: &str) -> i32 {
    let left: Vec<Option<u64>> = a.split('.').map(parse_component).collect();
    let right: Vec<Option<u64>> = b.split('.').map(parse_component).collect();

    for (l, r) in left.iter().zip(right.iter()) {
        let (Some(l), Some(r)) = (l, r) else {
            continue;
        };
        match l.cmp(r) {
            Ordering::Greater => return 1,
            Ordering::Less => return -1,
            Ordering::Equal => {}
        }
    }

    match left.len().cmp(&right.len()) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Leading digits of a component, so `09` == `9` and `1-beta` == `1`
fn parse_component(component: &str) -> Option<u64> {
    let digits: String = component
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
