//! Current weather from OpenWeatherMap

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::Result;
use crate::response::{Entities, SkillResponse};
use crate::skills::{Skill, SkillCatalog, SkillContext, slot};

/// City used when IP geolocation fails
const FALLBACK_CITY: &str = "London";

/// Location phrases meaning "wherever I am"
const HERE_WORDS: &[&str] = &["current", "current location", "here", "my location", "me"];

pub fn register(catalog: &mut SkillCatalog, ctx: &SkillContext) {
    let api_key = ctx.config.weather_api_key.clone();
    catalog.register("weather", move || {
        Ok(Arc::new(WeatherSkill::new(api_key.clone(), WeatherEndpoints::default())) as Arc<dyn Skill>)
    });
}

/// Service URLs
#[derive(Debug, Clone)]
pub struct WeatherEndpoints {
    /// Current-weather endpoint
    pub weather_url: String,
    /// IP geolocation endpoint returning `{"city": ...}`
    pub geo_url: String,
}

impl Default for WeatherEndpoints {
    fn default() -> Self {
        Self {
            weather_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            geo_url: "https://ipinfo.io/json".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct WeatherSkill {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    endpoints: WeatherEndpoints,
}

#[derive(Deserialize)]
struct GeoResponse {
    city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    main: MainReadings,
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

impl WeatherSkill {
    #[must_use]
    pub fn new(api_key: Option<SecretString>, endpoints: WeatherEndpoints) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoints,
        }
    }

    async fn locate(&self) -> String {
        let city = async {
            let geo: GeoResponse = self.client.get(&self.endpoints.geo_url).send().await?.json().await?;
            Ok::<_, reqwest::Error>(geo.city)
        }
        .await;

        match city {
            Ok(Some(city)) if !city.is_empty() => city,
            Ok(_) => FALLBACK_CITY.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "ip geolocation failed");
                FALLBACK_CITY.to_string()
            }
        }
    }
}

/// Trim punctuation; `None` when the user meant their own location
fn normalize_location(location: Option<&str>) -> Option<String> {
    let city = location?.trim_matches(|c: char| "?.!, ".contains(c));
    if city.is_empty() || HERE_WORDS.contains(&city.to_lowercase().as_str()) {
        None
    } else {
        Some(city.to_string())
    }
}

fn describe(city: &str, weather: &CurrentWeather) -> String {
    let description = weather.weather.first().map_or("clear", |c| c.description.as_str());
    format!(
        "It's currently {:.0} degrees and {description} in {city}. Expect a high of {:.0} degrees and a low of {:.0} degrees today.",
        weather.main.temp, weather.main.temp_max, weather.main.temp_min
    )
}

#[async_trait]
impl Skill for WeatherSkill {
    fn name(&self) -> &str {
        "weather"
    }

    fn intents(&self) -> &[&str] {
        &["get_weather"]
    }

    fn description(&self) -> &str {
        "Get the current weather and temperature for a city or the user's current location."
    }

    fn slots(&self) -> &[(&str, &str)] {
        &[("location", "City name (optional, defaults to current location)")]
    }

    fn examples(&self) -> &[&str] {
        &["is it going to rain", "how hot is it outside", "do I need an umbrella"]
    }

    async fn execute(&self, intent: &str, entities: &Entities) -> Result<SkillResponse> {
        let Some(api_key) = &self.api_key else {
            return Ok(SkillResponse::failure("Weather isn't set up yet. Add a WEATHER_API_KEY to enable it.")
                .with_intent(intent));
        };

        let city = match normalize_location(slot(entities, "location")) {
            Some(city) => city,
            None => self.locate().await,
        };

        let response = self
            .client
            .get(&self.endpoints.weather_url)
            .query(&[
                ("q", city.as_str()),
                ("appid", api_key.expose_secret()),
                ("units", "imperial"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::info!(city = %city, status = response.status().as_u16(), "no weather data");
            return Ok(SkillResponse::failure(format!("I couldn't find weather data for {city}.")).with_intent(intent));
        }

        let weather: CurrentWeather = response.json().await?;
        Ok(SkillResponse::text(describe(&city, &weather))
            .with_intent(intent)
            .with_data("location", city)
            .with_data("temperature", weather.main.temp)
            .with_visual("weather"))
    }
}
