use once_cell::sync::Lazy;
use regex::Regex;

static CODE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<label>.*\S)\s*\((?P<code>[^()]+)\)$").expect("suffix regex should compile")
});

/// Split `"Cardiology (COVI-1)"` into `("Cardiology", Some("COVI-1"))`.
/// Values without a trailing parenthetical come back unchanged.
pub fn split_code_suffix(value: &str) -> (&str, Option<&str>) {
    let value = value.trim();
    match CODE_SUFFIX.captures(value) {
        Some(caps) => {
            let label = caps.name("label").map_or(value, |m| m.as_str());
            let code = caps.name("code").map(|m| m.as_str().trim());
            (label, code)
        }
        None => (value, None),
    }
}
