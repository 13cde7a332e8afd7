//! Address display formatting

/// Default number of leading characters kept when abbreviating
pub const DEFAULT_HEAD: usize = 6;

/// Default number of trailing characters kept when abbreviating
pub const DEFAULT_TAIL: usize = 4;

/// Shorten an address to `head` leading and `tail` trailing characters joined by `...`.
///
/// Addresses no longer than `head + tail` are returned unchanged.
pub fn abbreviate_address(address: &str, head: usize, tail: usize) -> String {
    let len = address.chars().count();
    if len <= head + tail {
        return address.to_string();
    }

    let start: String = address.chars().take(head).collect();
    let end: String = address.chars().skip(len - tail).collect();
    format!("{}...{}", start, end)
}
