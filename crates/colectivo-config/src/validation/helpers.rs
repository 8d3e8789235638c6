//! Shared validation helpers used by all section validators.

/// Push an error if `value` is outside `[min, max]` (integer).
pub(crate) fn validate_range(errors: &mut Vec<String>, name: &str, value: u32, min: u32, max: u32) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

/// Push an error if `value` is outside `[min, max]` (float). NaN is rejected.
pub(crate) fn validate_range_f64(
    errors: &mut Vec<String>,
    name: &str,
    value: f64,
    min: f64,
    max: f64,
) {
    if !(min..=max).contains(&value) {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

/// Push an error unless `value` starts with one of `schemes` and has a host part.
pub(crate) fn validate_url_scheme(
    errors: &mut Vec<String>,
    name: &str,
    value: &str,
    schemes: &[&str],
) {
    let ok = schemes.iter().any(|scheme| {
        value
            .strip_prefix(scheme)
            .and_then(|rest| rest.strip_prefix("://"))
            .is_some_and(|host| !host.is_empty())
    });
    if !ok {
        let expected = schemes
            .iter()
            .map(|s| format!("{s}://"))
            .collect::<Vec<_>>()
            .join(" or ");
        errors.push(format!("{name} = \"{value}\" must start with {expected}"));
    }
}

/// Push errors for a latitude/longitude pair outside WGS84 bounds.
pub(crate) fn validate_coordinates(errors: &mut Vec<String>, name: &str, lat: f64, lon: f64) {
    validate_range_f64(errors, &format!("{name}.latitude"), lat, -90.0, 90.0);
    validate_range_f64(errors, &format!("{name}.longitude"), lon, -180.0, 180.0);
}
