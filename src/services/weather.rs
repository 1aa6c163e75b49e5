use async_trait::async_trait;
use chrono::{Duration, Local};
use reqwest::Client;
use serde::Deserialize;

use super::{check_status, WeatherProvider};
use crate::error::ServiceError;

#[derive(Debug, Deserialize)]
struct Coord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct Current {
    coord: Option<Coord>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Forecast {
    daily: Vec<Daily>,
}

#[derive(Debug, Deserialize)]
struct Daily {
    temp: DailyTemp,
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct DailyTemp {
    day: f64,
    night: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    main: String,
}

/// OpenWeatherMap client: looks the city up, then asks for a daily forecast.
pub struct OpenWeather {
    base_url: String,
    token: String,
    default_city: String,
    http: Client,
}

impl OpenWeather {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        default_city: impl Into<String>,
        http: Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            default_city: default_city.into(),
            http,
        }
    }

    async fn locate(&self, city: &str) -> Result<(Coord, String), ServiceError> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("q", city), ("units", "metric"), ("appid", self.token.as_str())])
            .send()
            .await?;
        // unknown cities answer 404 with a message body
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::Malformed(format!("unknown city '{}'", city)));
        }
        let current: Current = check_status(response).await?.json().await?;
        let coord = current
            .coord
            .ok_or_else(|| ServiceError::Malformed(format!("no coordinates for '{}'", city)))?;
        Ok((coord, current.name.unwrap_or_else(|| city.to_string())))
    }

    async fn daily(&self, coord: &Coord) -> Result<Vec<Daily>, ServiceError> {
        let url = format!("{}/data/2.5/onecall", self.base_url);
        let (lat, lon) = (coord.lat.to_string(), coord.lon.to_string());
        let response = self
            .http
            .get(&url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("exclude", "minutely,hourly"),
                ("units", "metric"),
                ("appid", self.token.as_str()),
            ])
            .send()
            .await?;
        let forecast: Forecast = check_status(response).await?.json().await?;
        Ok(forecast.daily)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeather {
    async fn forecast(&self, location_text: &str, horizon: usize) -> Result<String, ServiceError> {
        let mut located = None;
        if let Some(word) = extract_city(location_text) {
            for candidate in base_forms(&word) {
                match self.locate(&candidate).await {
                    Ok(found) => {
                        located = Some(found);
                        break;
                    }
                    Err(e) => log::debug!("No city '{}': {}", candidate, e),
                }
            }
        }
        let (coord, city) = match located {
            Some(found) => found,
            None => self.locate(&self.default_city).await?,
        };
        let days = self.daily(&coord).await?;
        if days.is_empty() {
            return Err(ServiceError::Malformed("empty daily forecast".to_string()));
        }
        Ok(render(&city, &days, horizon.max(1)))
    }
}

fn render(city: &str, days: &[Daily], horizon: usize) -> String {
    let today = Local::now().date_naive();
    let mut text = format!("Прогноз погоды: {}\n", city);
    for (i, day) in days.iter().take(horizon).enumerate() {
        let date = today + Duration::days(i as i64);
        let condition = day
            .weather
            .first()
            .map(|c| describe(&c.main))
            .unwrap_or("");
        text.push_str(&format!(
            "{}📅 Температура днем: {}, ночью: {}, {}\n",
            date.format("%d.%m.%Y"),
            day.temp.day.round() as i64,
            day.temp.night.round() as i64,
            condition
        ));
    }
    text
}

fn describe(condition: &str) -> &str {
    match condition {
        "Clear" => "Ясно ☀️",
        "Clouds" => "Облачно ☁",
        "Rain" => "Дождь ☂️",
        "Snow" => "Снег ❄️",
        "Mist" => "Туман 🌫️",
        "Thunderstorm" => "Гроза 🌩️",
        "Drizzle" => "Изморось 🌧️",
        other => other,
    }
}

/// Picks the place name out of a message: the word after "в"/"во", else the first
/// capitalized word that does not start the message.
fn extract_city(message: &str) -> Option<String> {
    let words: Vec<&str> = message
        .split(|c: char| !c.is_alphabetic() && c != '-')
        .filter(|w| !w.is_empty())
        .collect();

    let after_preposition = words.windows(2).find_map(|pair| {
        let preposition = pair[0].to_lowercase();
        matches!(preposition.as_str(), "в" | "во" | "in").then_some(pair[1])
    });
    let capitalized = || {
        words
            .iter()
            .skip(1)
            .find(|w| w.chars().next().is_some_and(char::is_uppercase))
            .copied()
    };
    after_preposition.or_else(capitalized).map(str::to_string)
}

// case ending -> nominative endings to try, first match wins
const CASE_ENDINGS: &[(&str, &[&str])] = &[
    ("ой", &["а"]),
    ("ом", &[""]),
    ("е", &["а", "", "ь"]),
    ("и", &["ь", "а", "я"]),
    ("у", &["а"]),
    ("ы", &["а"]),
];

/// The word as written, then guesses at its nominative form: "Казани" -> "Казань".
fn base_forms(word: &str) -> Vec<String> {
    let mut forms = vec![word.to_string()];
    if let Some((stem, replacements)) = CASE_ENDINGS
        .iter()
        .find_map(|(ending, replacements)| word.strip_suffix(ending).map(|stem| (stem, replacements)))
    {
        if stem.chars().count() >= 2 {
            forms.extend(replacements.iter().map(|r| format!("{}{}", stem, r)));
        }
    }
    forms
}
