mod utils;

pub mod geo;
pub mod owner;

use crate::discord::{Data, Error};

pub fn list() -> Vec<poise::Command<Data, Error>> {
    vec![
        geo::geochallenge(),
        geo::geodaily(),
        geo::setupgeodaily(),
        geo::cancelgeodaily(),
        owner::maintoken(),
        owner::autotoken(),
        owner::sync(),
    ]
}
