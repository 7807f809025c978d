use serde::{Deserialize, Serialize};

use crate::error::MalformedRecord;

/// One normalized seismic event as reported by the upstream feed.
///
/// `id` is the sole uniqueness key; everything except `id` and `time_ms` is
/// optional and stays `None` when the feed omits it, never coerced to a
/// sentinel value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub time_ms: i64,
    pub magnitude: Option<f64>,
    pub place: Option<String>,
    pub url: Option<String>,
    pub detail_url: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub depth_km: Option<f64>,
}

/// Wire shape of one GeoJSON feature as the feed returns it. Every field is
/// lenient so a single odd record never poisons the batch decode.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFeature {
    pub id: Option<String>,
    #[serde(default)]
    pub properties: RawProperties,
    pub geometry: Option<RawGeometry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProperties {
    pub time: Option<i64>,
    pub mag: Option<f64>,
    pub place: Option<String>,
    pub url: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGeometry {
    #[serde(default)]
    pub coordinates: Vec<Option<f64>>,
}

impl TryFrom<RawFeature> for Event {
    type Error = MalformedRecord;

    fn try_from(raw: RawFeature) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .filter(|id| !id.is_empty())
            .ok_or(MalformedRecord::MissingId)?;
        let time_ms = raw
            .properties
            .time
            .ok_or_else(|| MalformedRecord::MissingTime { id: id.clone() })?;

        // The coordinate triple is positional [longitude, latitude, depth].
        // Anything other than exactly three elements leaves all three unset.
        let mut coordinates = raw
            .geometry
            .map(|geometry| geometry.coordinates)
            .filter(|coordinates| coordinates.len() == 3)
            .unwrap_or_default()
            .into_iter();
        let longitude = coordinates.next().flatten();
        let latitude = coordinates.next().flatten();
        let depth_km = coordinates.next().flatten();

        Ok(Self {
            id,
            time_ms,
            magnitude: raw.properties.mag,
            place: raw.properties.place,
            url: raw.properties.url,
            detail_url: raw.properties.detail,
            longitude,
            latitude,
            depth_km,
        })
    }
}
