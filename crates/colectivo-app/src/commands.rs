//! Line commands read from stdin during a session.

use colectivo_common::ColectivoError;
use colectivo_config::schema::RouteConfig;
use colectivo_presence::Location;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Passenger: wait at a stop (route center if omitted).
    Wait { stop: Option<String> },
    /// Passenger: stop waiting.
    Cancel,
    /// Driver: broadcast position at a stop, optionally with a new seat count.
    Locate {
        stop: Option<String>,
        seats: Option<u32>,
    },
    /// Driver: broadcast a new seat count at the last position.
    Seats(u32),
    List,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  wait [stop]            mark yourself as waiting (passenger)
  cancel                 stop waiting (passenger)
  locate [stop] [seats]  broadcast your position (driver)
  seats <n>              broadcast a new free-seat count (driver)
  list                   show visible counterparts
  status                 show connection, local state and recent notices
  help                   show this help
  quit                   close the session and exit";

impl std::str::FromStr for Command {
    type Err = ColectivoError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(ColectivoError::InvalidInput("empty command".into()));
        };
        let rest: Vec<&str> = words.collect();

        match verb.to_ascii_lowercase().as_str() {
            "wait" => Ok(Command::Wait {
                stop: join_words(&rest),
            }),
            "cancel" => Ok(Command::Cancel),
            "locate" => {
                let (stop_words, seats) = match rest.split_last() {
                    Some((last, init)) => match last.parse::<u32>() {
                        Ok(seats) => (init, Some(seats)),
                        Err(_) => (&rest[..], None),
                    },
                    None => (&rest[..], None),
                };
                Ok(Command::Locate {
                    stop: join_words(stop_words),
                    seats,
                })
            }
            "seats" => match rest.as_slice() {
                [n] => n.parse().map(Command::Seats).map_err(|_| {
                    ColectivoError::InvalidInput(format!("'{n}' is not a seat count"))
                }),
                _ => Err(ColectivoError::InvalidInput("usage: seats <n>".into())),
            },
            "list" | "ls" => Ok(Command::List),
            "status" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(ColectivoError::InvalidInput(format!(
                "unknown command '{other}' (try 'help')"
            ))),
        }
    }
}

fn join_words(words: &[&str]) -> Option<String> {
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Location of a named stop, or the route center when no stop is given.
pub fn resolve_location(route: &RouteConfig, stop: Option<&str>) -> Result<Location, ColectivoError> {
    match stop {
        None => Ok(Location::new(route.center.latitude, route.center.longitude)),
        Some(query) => route
            .find_stop(query)
            .map(|s| Location::new(s.latitude, s.longitude))
            .ok_or_else(|| {
                ColectivoError::InvalidInput(format!(
                    "no stop matching '{query}' on route {}",
                    route.code
                ))
            }),
    }
}
