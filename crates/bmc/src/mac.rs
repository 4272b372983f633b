//! MAC address normalization and matching.

use crate::error::{BmcError, Result};

/// Normalize a MAC address to 12 upper-case hex digits.
///
/// Accepts `aa:bb:cc:dd:ee:ff`, `AA-BB-CC-DD-EE-FF`, `aabb.ccdd.eeff` and
/// the bare form.
///
/// # Errors
/// Returns [`BmcError::InvalidArgument`] if the text is not a MAC address.
pub fn normalize(mac: &str) -> Result<String> {
    let digits: String = mac
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect::<String>()
        .to_ascii_uppercase();

    if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(BmcError::InvalidArgument(format!(
            "invalid MAC address: {mac}"
        )));
    }

    Ok(digits)
}

/// Compare two MAC addresses ignoring case and separators.
///
/// Unparseable input never matches.
#[must_use]
pub fn same(a: &str, b: &str) -> bool {
    match (normalize(a), normalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Format a normalized MAC as `AA:BB:CC:DD:EE:FF`.
#[must_use]
pub fn display(normalized: &str) -> String {
    normalized
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}

/// Extract the MAC from a UEFI device path such as
/// `PciRoot(0x0)/Pci(0x1C,0x0)/MAC(3CECEF123456,0x1)/IPv4(...)`.
#[must_use]
pub fn from_uefi_device_path(path: &str) -> Option<String> {
    let start = path.to_ascii_uppercase().find("MAC(")? + 4;
    let candidate: String = path[start..]
        .chars()
        .take_while(char::is_ascii_hexdigit)
        .collect();

    normalize(&candidate).ok().map(|n| display(&n))
}
