//! REPL commands
//!
//! Parses a cleaned input line into a [`Command`] and runs it against a
//! [`Session`], which owns the PokéAPI client and the Pokémon caught so far.
//! Handlers write their output to any `std::io::Write`, so they can be
//! exercised without a terminal.

use std::collections::BTreeMap;
use std::io::{self, Write};

use chrono::{DateTime, Utc};
use rand::Rng;
use thiserror::Error;

use crate::data::{normalize_id, PageDirection, PokeApiClient, Pokemon, Transport};

/// A catch succeeds when the roll in `[0, 1)` is above this
const CATCH_THRESHOLD: f64 = 0.5;

/// Name and description of a command, used by `help`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// Every command, in the order `help` lists them
pub const COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        name: "help",
        description: "Displays a help message",
    },
    CommandInfo {
        name: "map",
        description: "Displays the next page of location areas",
    },
    CommandInfo {
        name: "mapb",
        description: "Displays the previous page of location areas",
    },
    CommandInfo {
        name: "explore",
        description: "Lists the Pokémon found in a location area",
    },
    CommandInfo {
        name: "catch",
        description: "Throws a Pokéball at a Pokémon",
    },
    CommandInfo {
        name: "inspect",
        description: "Shows details of a caught Pokémon",
    },
    CommandInfo {
        name: "pokedex",
        description: "Lists the Pokémon you have caught",
    },
    CommandInfo {
        name: "exit",
        description: "Exit the Pokedex",
    },
];

/// Errors from turning an input line into a command
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The first word is not a known command
    #[error("Unknown command: {0}")]
    Unknown(String),

    /// A required argument was not given
    #[error("Usage: {0}")]
    MissingArgument(&'static str),
}

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Map,
    MapBack,
    Explore(String),
    Catch(String),
    Inspect(String),
    Pokedex,
    Exit,
}

impl Command {
    /// Parses the words of a cleaned input line
    ///
    /// Extra words after the expected arguments are ignored.
    pub fn parse(words: &[String]) -> Result<Self, CommandError> {
        let Some(name) = words.first() else {
            return Err(CommandError::Unknown(String::new()));
        };
        let argument = |usage: &'static str| {
            words
                .get(1)
                .cloned()
                .ok_or(CommandError::MissingArgument(usage))
        };

        match name.as_str() {
            "help" => Ok(Command::Help),
            "map" => Ok(Command::Map),
            "mapb" => Ok(Command::MapBack),
            "explore" => argument("explore <location-area>").map(Command::Explore),
            "catch" => argument("catch <pokemon>").map(Command::Catch),
            "inspect" => argument("inspect <pokemon>").map(Command::Inspect),
            "pokedex" => Ok(Command::Pokedex),
            "exit" => Ok(Command::Exit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// What the REPL should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Exit,
}

/// A Pokémon in the collection and when it was caught
#[derive(Debug, Clone, PartialEq)]
pub struct CaughtPokemon {
    pub pokemon: Pokemon,
    pub caught_at: DateTime<Utc>,
}

/// State shared by all commands of one REPL run
pub struct Session<T, R> {
    api: PokeApiClient<T>,
    pokedex: BTreeMap<String, CaughtPokemon>,
    rng: R,
}

impl<T: Transport, R: Rng> Session<T, R> {
    /// Creates a session with an empty collection
    ///
    /// # Arguments
    /// * `api` - Client used by the map, explore and catch commands
    /// * `rng` - Source of catch rolls
    pub fn new(api: PokeApiClient<T>, rng: R) -> Self {
        Self {
            api,
            pokedex: BTreeMap::new(),
            rng,
        }
    }

    pub fn api(&self) -> &PokeApiClient<T> {
        &self.api
    }

    /// Caught Pokémon keyed by name
    pub fn pokedex(&self) -> &BTreeMap<String, CaughtPokemon> {
        &self.pokedex
    }

    /// Runs `command`, writing its output to `out`
    ///
    /// API failures are reported on `out` and never end the session; only an
    /// I/O error on `out` itself is returned.
    pub async fn execute<W: Write>(&mut self, command: &Command, out: &mut W) -> io::Result<Outcome> {
        match command {
            Command::Help => self.help(out)?,
            Command::Map => self.map(PageDirection::Next, out).await?,
            Command::MapBack => self.map(PageDirection::Previous, out).await?,
            Command::Explore(area) => self.explore(area, out).await?,
            Command::Catch(name) => self.catch(name, out).await?,
            Command::Inspect(name) => self.inspect(name, out)?,
            Command::Pokedex => self.list_pokedex(out)?,
            Command::Exit => {
                writeln!(out, "Closing the Pokedex... Goodbye!")?;
                return Ok(Outcome::Exit);
            }
        }
        Ok(Outcome::Continue)
    }

    fn help<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Welcome to the Pokedex!")?;
        writeln!(out, "Usage:")?;
        writeln!(out)?;
        for info in COMMANDS {
            writeln!(out, "{}: {}", info.name, info.description)?;
        }
        Ok(())
    }

    async fn map<W: Write>(&mut self, direction: PageDirection, out: &mut W) -> io::Result<()> {
        match self.api.get_location_areas(direction).await {
            Ok(areas) if areas.is_empty() => writeln!(out, "No locations found."),
            Ok(areas) => {
                for area in areas {
                    writeln!(out, "{}", area.name)?;
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "map failed");
                writeln!(out, "Error: {e}")
            }
        }
    }

    async fn explore<W: Write>(&self, area: &str, out: &mut W) -> io::Result<()> {
        let area = match self.api.get_location_area(area).await {
            Ok(area) => area,
            Err(e) => {
                tracing::warn!(error = %e, "explore failed");
                return writeln!(out, "Error: {e}");
            }
        };

        writeln!(out, "Exploring {}...", area.name)?;
        if area.pokemon_encounters.is_empty() {
            return writeln!(out, "Nothing found.");
        }
        writeln!(out, "Found Pokémon:")?;
        for encounter in &area.pokemon_encounters {
            writeln!(out, " - {}", encounter.pokemon.name)?;
        }
        Ok(())
    }

    async fn catch<W: Write>(&mut self, name: &str, out: &mut W) -> io::Result<()> {
        let pokemon = match self.api.get_pokemon(name).await {
            Ok(pokemon) => pokemon,
            Err(e) => {
                tracing::warn!(error = %e, "catch failed");
                return writeln!(out, "Failed to catch Pokémon: {e}");
            }
        };

        writeln!(out, "Throwing a Pokéball at {}...", pokemon.name)?;
        let roll: f64 = self.rng.gen();
        if roll > CATCH_THRESHOLD {
            writeln!(out, "{} was caught!", pokemon.name)?;
            writeln!(out, "You may now inspect it with the inspect command.")?;
            self.pokedex.insert(
                pokemon.name.clone(),
                CaughtPokemon {
                    pokemon,
                    caught_at: Utc::now(),
                },
            );
        } else {
            writeln!(out, "{} escaped!", pokemon.name)?;
        }
        Ok(())
    }

    fn inspect<W: Write>(&self, name: &str, out: &mut W) -> io::Result<()> {
        let Some(caught) = self.pokedex.get(&normalize_id(name)) else {
            return writeln!(out, "you have not caught that pokemon");
        };
        let pokemon = &caught.pokemon;

        writeln!(out, "Name: {}", pokemon.name)?;
        writeln!(out, "Height: {}", pokemon.height)?;
        writeln!(out, "Weight: {}", pokemon.weight)?;
        writeln!(out, "Stats:")?;
        for stat in &pokemon.stats {
            writeln!(out, " - {}: {}", stat.stat.name, stat.base_stat)?;
        }
        writeln!(out, "Types:")?;
        for kind in &pokemon.types {
            writeln!(out, " - {}", kind.kind.name)?;
        }
        writeln!(
            out,
            "Caught: {}",
            caught.caught_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }

    fn list_pokedex<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.pokedex.is_empty() {
            return writeln!(out, "Your Pokédex is empty.");
        }
        writeln!(out, "Your Pokédex:")?;
        for name in self.pokedex.keys() {
            writeln!(out, " - {name}")?;
        }
        Ok(())
    }
}
