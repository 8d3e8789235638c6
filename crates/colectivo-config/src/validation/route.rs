//! Validation for route, driver, and notification sections.

use crate::schema::ColectivoConfig;

use super::helpers::{validate_coordinates, validate_range};

pub(crate) fn validate_route(errors: &mut Vec<String>, config: &ColectivoConfig) {
    let route = &config.route;
    if route.code.trim().is_empty() {
        errors.push("route.code must not be empty".to_string());
    }
    validate_coordinates(
        errors,
        "route.center",
        route.center.latitude,
        route.center.longitude,
    );
    for (i, stop) in route.stops.iter().enumerate() {
        if stop.name.trim().is_empty() {
            errors.push(format!("route.stops[{i}].name must not be empty"));
        }
        validate_coordinates(
            errors,
            &format!("route.stops[{i}]"),
            stop.latitude,
            stop.longitude,
        );
    }
}

pub(crate) fn validate_driver(errors: &mut Vec<String>, config: &ColectivoConfig) {
    let driver = &config.driver;
    validate_range(errors, "driver.max_seats", driver.max_seats, 1, 16);
    if driver.default_seats > driver.max_seats {
        errors.push(format!(
            "driver.default_seats = {} exceeds driver.max_seats = {}",
            driver.default_seats, driver.max_seats
        ));
    }
}

pub(crate) fn validate_notifications(errors: &mut Vec<String>, config: &ColectivoConfig) {
    validate_range(
        errors,
        "notifications.capacity",
        config.notifications.capacity,
        1,
        64,
    );
}
