//! Core data models for the Pokedex CLI
//!
//! This module contains the PokéAPI resource shapes the command layer reads:
//! paginated name/url listings, location areas with their encounters, and
//! Pokémon records.

pub mod pokeapi;

pub use pokeapi::{
    normalize_id, ApiError, HttpTransport, PageCursor, PageDirection, PokeApiClient, ResourceId,
    Transport, PAGE_LIMIT, POKEAPI_BASE_URL,
};

use serde::{Deserialize, Serialize};

/// A named link to another resource, as returned by list endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedResource {
    pub name: String,
    pub url: String,
}

/// A location area and the Pokémon that can be encountered there
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationArea {
    #[serde(default)]
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub pokemon_encounters: Vec<PokemonEncounter>,
}

/// One encounter entry of a location area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonEncounter {
    pub pokemon: NamedResource,
}

/// A Pokémon record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pokemon {
    #[serde(default)]
    pub id: u32,
    pub name: String,
    /// Height in decimetres
    pub height: u32,
    /// Weight in hectograms
    pub weight: u32,
    #[serde(default)]
    pub base_experience: Option<u32>,
    #[serde(default)]
    pub stats: Vec<PokemonStat>,
    #[serde(default)]
    pub types: Vec<PokemonType>,
}

/// A base stat value, e.g. `hp: 35`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonStat {
    pub base_stat: u32,
    #[serde(default)]
    pub effort: u32,
    pub stat: NamedResource,
}

/// One of a Pokémon's types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonType {
    #[serde(default)]
    pub slot: u8,
    #[serde(rename = "type")]
    pub kind: NamedResource,
}
