//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Colectivo Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[realtime]
# url = "ws://localhost:3005/ws"   # ws:// or wss://
# connect_timeout_secs = 15         # 1-120
# heartbeat_interval_secs = 25      # 5-300
# reconnect_delay_secs = 1          # 1-60, doubles after each failure
# max_reconnect_delay_secs = 30     # 1-600

[api]
# base_url = "http://localhost:3005/api"
# request_timeout_secs = 10         # 1-120
# seed_on_connect = true            # fetch current counterparts on every connect

[route]
# code = "501"
# name = "Alameda - San Bernardo"
# description = "Alameda, Gran Avenida, La Cisterna, San Bernardo"
# center = { latitude = -33.5180, longitude = -70.6693 }

# [[route.stops]]
# name = "Alameda - Amunátegui"
# latitude = -33.4489
# longitude = -70.6693

[driver]
# default_seats = 4                 # 0-max_seats
# max_seats = 4                     # 1-16

[notifications]
# enabled = true
# capacity = 5                      # 1-64

[logging]
# level = "INFO"                    # DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
