use super::{
    Challenge, ChallengeOptions, GeoApi, LeaderboardEntry, MapInfo, BASE_URL, PLACEHOLDER_GUESS,
};
use crate::{error::BotError, session::SessionToken};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, COOKIE, REFERER},
    Method, RequestBuilder, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
/// A challenge has 5 rounds. Anything beyond that means the game is stuck.
const MAX_GUESSES: usize = 10;
const POPULAR_PAGES: u32 = 5;
const POPULAR_PAGE_SIZE: &str = "36";
/// Pause between popular map pages to stay clear of rate limits.
const PAGE_DELAY: Duration = Duration::from_secs(1);

pub struct GeoGuessr {
    http: reqwest::Client,
}

impl GeoGuessr {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static("https://www.geoguessr.com/"));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to build http client")?;

        Ok(Self { http })
    }

    fn request(&self, method: Method, path: &str, token: &SessionToken) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", BASE_URL, path))
            .header(COOKIE, format!("_ncfa={}", token.expose()))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        token: &SessionToken,
    ) -> Result<T> {
        let response = request.send().await.map_err(upstream)?;
        check_status(response.status(), token)?;
        response.json::<T>().await.map_err(upstream)
    }

    /// Like [`GeoGuessr::send`] for responses whose body is of no interest.
    async fn execute(&self, request: RequestBuilder, token: &SessionToken) -> Result<()> {
        let response = request.send().await.map_err(upstream)?;
        check_status(response.status(), token)?;
        Ok(())
    }
}

fn upstream(err: reqwest::Error) -> anyhow::Error {
    if err.is_timeout() {
        BotError::UpstreamTimeout.into()
    } else {
        BotError::Upstream(err.without_url().to_string()).into()
    }
}

fn check_status(status: StatusCode, token: &SessionToken) -> Result<(), BotError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            log::error!(
                "GeoGuessr rejected the {} token (it may be expired).",
                token.role()
            );
            Err(BotError::ExpiredToken(token.role()))
        }
        status if status.is_success() => Ok(()),
        status => Err(BotError::Upstream(format!("status {}", status))),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewChallenge<'a> {
    map: &'a str,
    time_limit: u32,
    forbid_moving: bool,
    forbid_zooming: bool,
    forbid_rotating: bool,
    access_level: u8,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Guess<'a> {
    token: &'a str,
    lat: f64,
    lng: f64,
    timed_out: bool,
}

/// The web client looks up the terrain of a spot before guessing it.
#[derive(Serialize)]
struct Terrain {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct GameState {
    state: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplorerMap {
    slug: String,
    name: String,
    #[serde(default)]
    country_code: Option<String>,
}

#[derive(Deserialize)]
struct PopularMap {
    slug: String,
    name: String,
}

#[derive(Deserialize)]
struct FoundMap {
    id: String,
    name: String,
}

fn found_name(found: Vec<FoundMap>, slug: &str) -> Option<String> {
    found
        .into_iter()
        .next()
        .filter(|map| map.id == slug)
        .map(|map| map.name)
}

#[derive(Deserialize)]
struct Highscores {
    items: Vec<HighscoreItem>,
}

#[derive(Deserialize)]
struct HighscoreItem {
    game: HighscoreGame,
}

#[derive(Deserialize)]
struct HighscoreGame {
    player: HighscorePlayer,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HighscorePlayer {
    nick: String,
    id: String,
    total_score: Amount,
    total_distance_in_meters: Number,
}

#[derive(Deserialize)]
struct Amount {
    amount: Number,
}

/// GeoGuessr sends some numbers as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Float(f64),
    Text(String),
}

impl Number {
    fn value(&self) -> Result<f64> {
        match self {
            Number::Float(value) => Ok(*value),
            Number::Text(text) => text
                .parse()
                .with_context(|| format!("`{}` is not a number", text)),
        }
    }
}

fn parse_highscores(highscores: Highscores) -> Result<Vec<LeaderboardEntry>> {
    highscores
        .items
        .into_iter()
        .map(|item| {
            let player = item.game.player;
            Ok(LeaderboardEntry {
                score: player.total_score.amount.value()?.round() as u64,
                distance_m: player.total_distance_in_meters.value()?,
                username: player.nick,
                user_id: player.id,
            })
        })
        .collect()
}

#[async_trait]
impl GeoApi for GeoGuessr {
    async fn create_challenge(
        &self,
        token: &SessionToken,
        options: &ChallengeOptions,
    ) -> Result<Challenge> {
        let body = NewChallenge {
            map: &options.map,
            time_limit: options.time_limit,
            forbid_moving: options.no_move,
            forbid_zooming: options.no_zoom,
            forbid_rotating: options.no_pan,
            access_level: 1,
        };

        let response = self
            .request(Method::POST, "/api/v3/challenges", token)
            .json(&body)
            .send()
            .await
            .map_err(upstream)?;

        // GeoGuessr answers unknown maps and impossible settings with a 500.
        if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
            log::info!("GeoGuessr refused challenge options {:?}.", options);
            return Err(BotError::Upstream("invalid challenge options".into()).into());
        }
        check_status(response.status(), token)?;

        let created: TokenResponse = response.json().await.map_err(upstream)?;
        Ok(Challenge::from_id(created.token))
    }

    async fn submit_placeholder_guess(
        &self,
        token: &SessionToken,
        challenge: &Challenge,
    ) -> Result<()> {
        let start = format!("/api/v3/challenges/{}", challenge.challenge_id);
        let game: TokenResponse = self
            .send(
                self.request(Method::POST, &start, token)
                    .json(&serde_json::json!({})),
                token,
            )
            .await?;

        let path = format!("/api/v3/games/{}", game.token);
        let terrain = Terrain {
            lat: PLACEHOLDER_GUESS.lat,
            lng: PLACEHOLDER_GUESS.lng,
        };
        for _ in 0..MAX_GUESSES {
            self.execute(
                self.request(Method::POST, "/api/v4/geo-coding/terrain", token)
                    .json(&terrain),
                token,
            )
            .await?;

            let guess = Guess {
                token: &game.token,
                lat: PLACEHOLDER_GUESS.lat,
                lng: PLACEHOLDER_GUESS.lng,
                timed_out: false,
            };
            self.execute(self.request(Method::POST, &path, token).json(&guess), token)
                .await?;

            let state: GameState = self
                .send(
                    self.request(Method::GET, &path, token)
                        .query(&[("client", "web")]),
                    token,
                )
                .await?;
            if state.state == "finished" {
                return Ok(());
            }
        }

        Err(BotError::Upstream(format!(
            "game {} did not finish after {} guesses",
            game.token, MAX_GUESSES
        ))
        .into())
    }

    async fn highscores(
        &self,
        token: &SessionToken,
        challenge: &Challenge,
    ) -> Result<Vec<LeaderboardEntry>> {
        let path = format!("/api/v3/results/highscores/{}", challenge.challenge_id);
        let highscores: Highscores = self
            .send(
                self.request(Method::GET, &path, token).query(&[
                    ("friends", "false"),
                    ("limit", "9999"),
                    ("minRounds", "5"),
                ]),
                token,
            )
            .await?;

        parse_highscores(highscores)
    }

    async fn maps(&self, token: &SessionToken) -> Result<Vec<MapInfo>> {
        let maps: Vec<ExplorerMap> = self
            .send(self.request(Method::GET, "/api/maps/explorer", token), token)
            .await?;

        Ok(maps
            .into_iter()
            .map(|map| MapInfo {
                slug: map.slug,
                name: map.name,
                country_code: map.country_code.unwrap_or_default(),
            })
            .collect())
    }

    async fn popular_maps(&self, token: &SessionToken) -> Result<Vec<MapInfo>> {
        let mut maps = Vec::new();
        for page in 1..=POPULAR_PAGES {
            if page > 1 {
                tokio::time::sleep(PAGE_DELAY).await;
            }
            let page = page.to_string();
            let popular: Vec<PopularMap> = self
                .send(
                    self.request(Method::GET, "/api/v3/social/maps/browse/popular/all", token)
                        .query(&[
                            ("count", POPULAR_PAGE_SIZE),
                            ("page", page.as_str()),
                            ("minCoords", "20"),
                            ("minLikes", "0"),
                            ("minGamesPlayed", "0"),
                        ]),
                    token,
                )
                .await?;

            maps.extend(popular.into_iter().map(|map| MapInfo {
                slug: map.slug,
                name: map.name,
                country_code: String::new(),
            }));
        }

        Ok(maps)
    }

    async fn search_map_name(&self, token: &SessionToken, slug: &str) -> Result<Option<String>> {
        let found: Vec<FoundMap> = self
            .send(
                self.request(Method::GET, "/api/v3/search/map", token)
                    .query(&[("page", "0"), ("count", "1"), ("q", slug)]),
                token,
            )
            .await?;

        Ok(found_name(found, slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    #[test]
    fn highscores_accept_numbers_and_strings() {
        let body = r#"{
            "items": [
                { "game": { "player": {
                    "nick": "alice", "id": "a1",
                    "totalScore": { "amount": "21500" },
                    "totalDistanceInMeters": 1234.5
                } } },
                { "game": { "player": {
                    "nick": "bob", "id": "b2",
                    "totalScore": { "amount": 9000 },
                    "totalDistanceInMeters": "99000.25"
                } } }
            ]
        }"#;

        let entries = parse_highscores(serde_json::from_str(body).unwrap()).unwrap();
        assert_eq!(
            entries,
            vec![
                LeaderboardEntry {
                    username: "alice".into(),
                    user_id: "a1".into(),
                    score: 21500,
                    distance_m: 1234.5,
                },
                LeaderboardEntry {
                    username: "bob".into(),
                    user_id: "b2".into(),
                    score: 9000,
                    distance_m: 99000.25,
                },
            ]
        );
    }

    #[test]
    fn malformed_scores_are_errors() {
        let body = r#"{ "items": [ { "game": { "player": {
            "nick": "eve", "id": "e",
            "totalScore": { "amount": "lots" },
            "totalDistanceInMeters": 1
        } } } ] }"#;

        assert!(parse_highscores(serde_json::from_str(body).unwrap()).is_err());
    }

    #[test]
    fn rejected_sessions_name_their_role() {
        let token = SessionToken::new(Role::Auto, "cookie");
        assert!(matches!(
            check_status(StatusCode::UNAUTHORIZED, &token),
            Err(BotError::ExpiredToken(Role::Auto))
        ));
        assert!(matches!(
            check_status(StatusCode::BAD_GATEWAY, &token),
            Err(BotError::Upstream(_))
        ));
        assert!(check_status(StatusCode::OK, &token).is_ok());
    }

    #[test]
    fn challenge_request_uses_api_names() {
        let body = NewChallenge {
            map: "world",
            time_limit: 180,
            forbid_moving: true,
            forbid_zooming: false,
            forbid_rotating: true,
            access_level: 1,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "map": "world",
                "timeLimit": 180,
                "forbidMoving": true,
                "forbidZooming": false,
                "forbidRotating": true,
                "accessLevel": 1
            })
        );
    }

    #[test]
    fn terrain_lookup_sends_coordinates_only() {
        let terrain = Terrain { lat: -83.0, lng: 0.0 };
        assert_eq!(
            serde_json::to_value(&terrain).unwrap(),
            serde_json::json!({ "lat": -83.0, "lng": 0.0 })
        );
    }

    #[test]
    fn map_search_must_match_the_slug() {
        let found = |body: &str| -> Vec<FoundMap> { serde_json::from_str(body).unwrap() };

        assert_eq!(
            found_name(found(r#"[{ "id": "abc", "name": "A Balanced World" }]"#), "abc"),
            Some("A Balanced World".to_string())
        );
        assert_eq!(
            found_name(found(r#"[{ "id": "other", "name": "Something Else" }]"#), "abc"),
            None
        );
        assert_eq!(found_name(found("[]"), "abc"), None);
    }
}
