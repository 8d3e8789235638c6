//! Validation for the realtime and api sections.

use crate::schema::ColectivoConfig;

use super::helpers::{validate_range, validate_url_scheme};

/// Validate realtime connection constraints.
pub(crate) fn validate_realtime(errors: &mut Vec<String>, config: &ColectivoConfig) {
    let rt = &config.realtime;
    validate_url_scheme(errors, "realtime.url", &rt.url, &["ws", "wss"]);
    validate_range(
        errors,
        "realtime.connect_timeout_secs",
        rt.connect_timeout_secs,
        1,
        120,
    );
    validate_range(
        errors,
        "realtime.heartbeat_interval_secs",
        rt.heartbeat_interval_secs,
        5,
        300,
    );
    validate_range(
        errors,
        "realtime.reconnect_delay_secs",
        rt.reconnect_delay_secs,
        1,
        60,
    );
    validate_range(
        errors,
        "realtime.max_reconnect_delay_secs",
        rt.max_reconnect_delay_secs,
        1,
        600,
    );
    if rt.reconnect_delay_secs > rt.max_reconnect_delay_secs {
        errors.push(format!(
            "realtime.reconnect_delay_secs = {} exceeds realtime.max_reconnect_delay_secs = {}",
            rt.reconnect_delay_secs, rt.max_reconnect_delay_secs
        ));
    }
}

/// Validate snapshot API constraints.
pub(crate) fn validate_api(errors: &mut Vec<String>, config: &ColectivoConfig) {
    validate_url_scheme(
        errors,
        "api.base_url",
        &config.api.base_url,
        &["http", "https"],
    );
    validate_range(
        errors,
        "api.request_timeout_secs",
        config.api.request_timeout_secs,
        1,
        120,
    );
}
