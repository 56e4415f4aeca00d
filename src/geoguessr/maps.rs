use super::MapInfo;
use std::collections::HashMap;
use url::Url;

/// Discord allows at most 25 autocomplete choices.
const MAX_SUGGESTIONS: usize = 25;
const PINNED: [(&str, &str); 2] = [("world", "World"), ("famous-places", "Famous Places")];

/// Known maps by slug.
#[derive(Debug)]
pub struct MapCatalog {
    maps: HashMap<String, MapInfo>,
}

impl Default for MapCatalog {
    fn default() -> Self {
        let mut catalog = Self {
            maps: HashMap::new(),
        };
        catalog.insert_pinned();
        catalog
    }
}

fn is_pinned(slug: &str) -> bool {
    PINNED.iter().any(|(pinned, _)| *pinned == slug)
}

impl MapCatalog {
    fn insert_pinned(&mut self) {
        for (slug, name) in PINNED {
            self.maps.entry(slug.to_string()).or_insert_with(|| MapInfo {
                slug: slug.to_string(),
                name: name.to_string(),
                country_code: String::new(),
            });
        }
    }

    /// Replaces the catalog, keeping World and Famous Places available.
    pub fn replace(&mut self, maps: Vec<MapInfo>) {
        self.maps = maps
            .into_iter()
            .map(|map| (map.slug.clone(), map))
            .collect();
        self.insert_pinned();
    }

    /// Adds maps which aren't known yet, existing entries win.
    pub fn extend(&mut self, maps: Vec<MapInfo>) {
        for map in maps {
            self.maps.entry(map.slug.clone()).or_insert(map);
        }
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// Finds the slug for a slug, map name, country code or map url.
    pub fn resolve(&self, input: &str) -> Option<String> {
        let input = input.trim();
        if self.maps.contains_key(input) {
            return Some(input.to_string());
        }

        let wanted = input.to_lowercase();
        let mut matches: Vec<&MapInfo> = self
            .maps
            .values()
            .filter(|map| {
                map.name.to_lowercase() == wanted
                    || (!map.country_code.is_empty() && map.country_code.to_lowercase() == wanted)
            })
            .collect();
        // Stable pick when several maps share a name.
        matches.sort_by(|a, b| a.slug.cmp(&b.slug));
        if let Some(map) = matches.first() {
            return Some(map.slug.clone());
        }

        parse_map_url(input)
    }

    pub fn name(&self, slug: &str) -> Option<&str> {
        self.maps.get(slug).map(|map| map.name.as_str())
    }

    /// Falls back to the slug for unknown maps.
    pub fn name_of(&self, slug: &str) -> String {
        self.name(slug).unwrap_or(slug).to_string()
    }

    /// `(name, slug)` pairs for autocompletion.
    pub fn suggest(&self, partial: &str) -> Vec<(String, String)> {
        let partial = partial.trim().to_lowercase();
        let mut suggestions = Vec::new();

        if partial.is_empty() {
            for (slug, _) in PINNED {
                suggestions.push((self.name_of(slug), slug.to_string()));
            }
        }

        let mut found: Vec<(String, String)> = self
            .maps
            .values()
            // Already listed on top.
            .filter(|map| !(partial.is_empty() && is_pinned(&map.slug)))
            .filter(|map| {
                map.name.to_lowercase().contains(&partial)
                    || map.country_code.to_lowercase().contains(&partial)
            })
            .map(|map| (map.name.clone(), map.slug.clone()))
            .collect();
        found.sort();

        suggestions.extend(found);
        suggestions.truncate(MAX_SUGGESTIONS);
        suggestions
    }
}

/// Extracts the slug of `geoguessr.com/maps/<slug>` urls.
fn parse_map_url(input: &str) -> Option<String> {
    let url = Url::parse(input)
        .or_else(|_| Url::parse(&format!("https://{}", input)))
        .ok()?;
    if !matches!(url.host_str()?, "geoguessr.com" | "www.geoguessr.com") {
        return None;
    }

    let mut segments = url.path_segments()?;
    if segments.next()? != "maps" {
        return None;
    }
    let slug = segments.next()?.to_lowercase();

    match slug.as_str() {
        "" | "community" => None,
        _ => Some(slug),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MapCatalog {
        let mut catalog = MapCatalog::default();
        catalog.replace(vec![
            MapInfo {
                slug: "59a1514f17631e74145b6f47".into(),
                name: "Netherlands".into(),
                country_code: "nl".into(),
            },
            MapInfo {
                slug: "5b0a80f8596695b708122809".into(),
                name: "A Diverse World".into(),
                country_code: String::new(),
            },
            MapInfo {
                slug: "world".into(),
                name: "World".into(),
                country_code: String::new(),
            },
        ]);
        catalog
    }

    #[test]
    fn pinned_maps_exist_without_refresh() {
        let catalog = MapCatalog::default();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.resolve("World").as_deref(), Some("world"));
        assert_eq!(catalog.name_of("famous-places"), "Famous Places");
    }

    #[test]
    fn resolves_slugs_names_and_country_codes() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 4);
        assert_eq!(
            catalog.resolve("59a1514f17631e74145b6f47").as_deref(),
            Some("59a1514f17631e74145b6f47")
        );
        assert_eq!(
            catalog.resolve("netherlands").as_deref(),
            Some("59a1514f17631e74145b6f47")
        );
        assert_eq!(
            catalog.resolve("NL").as_deref(),
            Some("59a1514f17631e74145b6f47")
        );
        assert_eq!(catalog.resolve("Atlantis"), None);
    }

    #[test]
    fn resolves_map_urls() {
        let catalog = catalog();
        assert_eq!(
            catalog
                .resolve("https://www.geoguessr.com/maps/62A44B22040F04BD36E8A914")
                .as_deref(),
            Some("62a44b22040f04bd36e8a914")
        );
        assert_eq!(
            catalog.resolve("www.geoguessr.com/maps/abc/play").as_deref(),
            Some("abc")
        );
        assert_eq!(
            catalog.resolve("https://www.geoguessr.com/maps/community"),
            None
        );
        assert_eq!(catalog.resolve("https://example.com/maps/abc"), None);
        assert_eq!(
            catalog.resolve("http://geoguessr.com/maps/xyz?ref=share#top").as_deref(),
            Some("xyz")
        );
        assert_eq!(catalog.resolve("https://www.geoguessr.com/challenge/abc"), None);
        assert_eq!(catalog.resolve("https://www.geoguessr.com/maps/"), None);
    }

    #[test]
    fn empty_input_suggests_pinned_maps_first() {
        let suggestions = catalog().suggest("");
        assert_eq!(suggestions[0], ("World".to_string(), "world".to_string()));
        assert_eq!(
            suggestions[1],
            ("Famous Places".to_string(), "famous-places".to_string())
        );
        assert_eq!(suggestions.len(), 4);
    }

    #[test]
    fn suggestions_match_names_and_country_codes() {
        let catalog = catalog();
        let names: Vec<String> = catalog
            .suggest("world")
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["A Diverse World", "World"]);

        let by_code = catalog.suggest("nl");
        assert_eq!(by_code.len(), 1);
        assert_eq!(by_code[0].0, "Netherlands");
    }

    #[test]
    fn suggestions_are_capped() {
        let mut catalog = MapCatalog::default();
        catalog.replace(
            (0..40)
                .map(|i| MapInfo {
                    slug: format!("map-{}", i),
                    name: format!("Map {:02}", i),
                    country_code: String::new(),
                })
                .collect(),
        );
        assert_eq!(catalog.suggest("map").len(), MAX_SUGGESTIONS);
    }

    #[test]
    fn extending_keeps_known_names() {
        let mut catalog = catalog();
        catalog.extend(vec![
            MapInfo {
                slug: "59a1514f17631e74145b6f47".into(),
                name: "Dutch roads".into(),
                country_code: String::new(),
            },
            MapInfo {
                slug: "62a44b22040f04bd36e8a914".into(),
                name: "A Community World".into(),
                country_code: String::new(),
            },
        ]);

        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.name_of("59a1514f17631e74145b6f47"), "Netherlands");
        assert_eq!(catalog.name("62a44b22040f04bd36e8a914"), Some("A Community World"));
        assert_eq!(catalog.name("unknown"), None);
        assert_eq!(catalog.name_of("unknown"), "unknown");
    }
}
