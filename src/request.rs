//! Static map request URLs.
//!
//! A trip is drawn through the Mapbox Static Images API by embedding its path
//! as a GeoJSON overlay in the request path:
//!
//! ```text
//! {endpoint}/styles/v1/{style}/static/geojson({geometry})/auto/{w}x{h}@2x?access_token={token}&logo=false
//! ```

use log::warn;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::TripSummary;

pub const DEFAULT_ENDPOINT: &str = "https://api.mapbox.com";
pub const DEFAULT_STYLE: &str = "mapbox/streets-v10";
const DEFAULT_SIZE: u32 = 1024;

/// Characters left as-is in the geometry segment: the RFC 3986 unreserved
/// set plus `$&+:=@`. Brackets and commas in the JSON are escaped.
const GEOMETRY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// GeoJSON `LineString` geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineStringGeometry<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub coordinates: &'a [[f64; 2]],
}

impl<'a> LineStringGeometry<'a> {
    pub fn new(coordinates: &'a [[f64; 2]]) -> Self {
        Self {
            kind: "LineString",
            coordinates,
        }
    }
}

/// Rendering options shared by every request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Base URL of the static images API.
    pub endpoint: String,
    /// `owner/style_id` of the map style.
    pub style: String,
    pub width: u32,
    pub height: u32,
    /// Request a 2x pixel density image.
    pub retina: bool,
    /// Hide the provider's logo overlay.
    pub hide_logo: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            style: DEFAULT_STYLE.to_string(),
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            retina: true,
            hide_logo: true,
        }
    }
}

/// A fully formed request for one trip's map.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub trip_index: usize,
    pub url: Url,
}

/// Builds [`RenderRequest`]s from trip summaries.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base: Url,
    size: String,
    access_token: String,
    hide_logo: bool,
}

impl RequestBuilder {
    /// Validate the configuration once so that building a request can only
    /// fail on the trip itself.
    pub fn new(config: &RenderConfig, access_token: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
            reason,
        };

        if config.width == 0 || config.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "map size must be positive, got {}x{}",
                config.width, config.height
            )));
        }

        let mut base = Url::parse(&config.endpoint).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", base.scheme())));
        }
        base.path_segments_mut()
            .map_err(|_| invalid("not a base URL".to_string()))?
            .pop_if_empty()
            .extend(["styles", "v1"])
            .extend(config.style.split('/').filter(|s| !s.is_empty()))
            .push("static");

        let density = if config.retina { "@2x" } else { "" };

        Ok(Self {
            base,
            size: format!("{}x{}{}", config.width, config.height, density),
            access_token: access_token.to_string(),
            hide_logo: config.hide_logo,
        })
    }

    /// Build the request URL for a trip.
    ///
    /// The geometry JSON is percent-encoded into a single path segment.
    /// Paths with a non-finite coordinate cannot be written as JSON numbers
    /// and fail with [`Error::Json`].
    pub fn build(&self, summary: &TripSummary) -> Result<RenderRequest> {
        if summary.path.iter().flatten().any(|c| !c.is_finite()) {
            return Err(Error::Json(<serde_json::Error as serde::ser::Error>::custom(format!(
                "trip {} has a non-finite coordinate",
                summary.index
            ))));
        }
        let geometry = serde_json::to_string(&LineStringGeometry::new(&summary.path))?;

        // `set_path` leaves existing escapes alone, so the segment is only
        // encoded once.
        let mut url = self.base.clone();
        url.set_path(&format!(
            "{}/geojson({})/auto/{}",
            self.base.path(),
            utf8_percent_encode(&geometry, GEOMETRY_ESCAPE),
            self.size
        ));

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("access_token", &self.access_token);
            if self.hide_logo {
                query.append_pair("logo", "false");
            }
        }

        Ok(RenderRequest {
            trip_index: summary.index,
            url,
        })
    }

    /// Build requests for a stream of summaries, logging and dropping failures.
    pub fn build_all<'a, I>(&'a self, summaries: I) -> impl Iterator<Item = RenderRequest> + 'a
    where
        I: IntoIterator<Item = TripSummary> + 'a,
        I::IntoIter: 'a,
    {
        summaries
            .into_iter()
            .filter_map(move |summary| match self.build(&summary) {
                Ok(request) => Some(request),
                Err(e) => {
                    warn!("[Trip {}] {}", summary.index, e);
                    None
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn summary() -> TripSummary {
        TripSummary {
            index: 0,
            path: vec![[-73.0, 40.0], [-73.1, 40.1]],
            total_distance_miles: 8.7,
            total_duration: TimeDelta::minutes(30),
        }
    }

    #[test]
    fn test_geometry_json() {
        let path = summary().path;
        let json = serde_json::to_string(&LineStringGeometry::new(&path)).unwrap();
        assert_eq!(json, r#"{"type":"LineString","coordinates":[[-73.0,40.0],[-73.1,40.1]]}"#);
    }

    #[test]
    fn test_default_url() {
        let builder = RequestBuilder::new(&RenderConfig::default(), "pk.test").unwrap();
        let request = builder.build(&summary()).unwrap();
        let url = request.url.as_str();

        assert!(url.starts_with("https://api.mapbox.com/styles/v1/mapbox/streets-v10/static/geojson("));
        assert!(url.contains(
            "/geojson(%7B%22type%22:%22LineString%22%2C%22coordinates%22:\
             %5B%5B-73.0%2C40.0%5D%2C%5B-73.1%2C40.1%5D%5D%7D)/"
        ));
        assert!(url.ends_with("/auto/1024x1024@2x?access_token=pk.test&logo=false"));
        assert_eq!(request.trip_index, 0);
    }

    #[test]
    fn test_geometry_round_trips_through_url() {
        let builder = RequestBuilder::new(&RenderConfig::default(), "pk.test").unwrap();
        let request = builder.build(&summary()).unwrap();
        let segments: Vec<_> = request.url.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 8);
        assert!(!segments[5].contains('"'));
        assert!(!segments[5].contains('{'));
        assert!(!segments[5].contains(&['[', ']', ','][..]));
        assert_eq!(segments[6], "auto");
    }

    #[test]
    fn test_non_finite_path_rejected() {
        let builder = RequestBuilder::new(&RenderConfig::default(), "pk.test").unwrap();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut trip = summary();
            trip.path[0][1] = bad;
            assert!(matches!(builder.build(&trip), Err(Error::Json(_))));
        }

        let mut trip = summary();
        trip.path[1][0] = f64::NAN;
        assert_eq!(builder.build_all(vec![trip, summary()]).count(), 1);
    }

    #[test]
    fn test_custom_config() {
        let config = RenderConfig {
            endpoint: "http://localhost:8080/".to_string(),
            style: "me/outdoors".to_string(),
            width: 640,
            height: 480,
            retina: false,
            hide_logo: false,
        };
        let builder = RequestBuilder::new(&config, "abc").unwrap();
        let url = builder.build(&summary()).unwrap().url;

        assert!(url.as_str().starts_with("http://localhost:8080/styles/v1/me/outdoors/static/"));
        assert!(url.as_str().ends_with("/auto/640x480?access_token=abc"));
    }

    #[test]
    fn test_invalid_endpoint() {
        let config = RenderConfig {
            endpoint: "not a url".to_string(),
            ..RenderConfig::default()
        };
        assert!(matches!(
            RequestBuilder::new(&config, "abc"),
            Err(Error::InvalidEndpoint { .. })
        ));

        let config = RenderConfig {
            endpoint: "mailto:someone@example.com".to_string(),
            ..RenderConfig::default()
        };
        assert!(RequestBuilder::new(&config, "abc").is_err());
    }

    #[test]
    fn test_zero_size_rejected() {
        let config = RenderConfig {
            width: 0,
            ..RenderConfig::default()
        };
        assert!(matches!(
            RequestBuilder::new(&config, "abc"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_build_all_preserves_order() {
        let builder = RequestBuilder::new(&RenderConfig::default(), "abc").unwrap();
        let mut second = summary();
        second.index = 4;
        let indices: Vec<_> = builder
            .build_all(vec![summary(), second])
            .map(|r| r.trip_index)
            .collect();
        assert_eq!(indices, vec![0, 4]);
    }
}
