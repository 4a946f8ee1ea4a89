use serde::{Deserialize, Serialize};

const MAPS_EMBED_URL: &str = "https://www.google.com/maps/embed/v1/place";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Embeddable satellite map centred on `address`
pub fn map_embed_url(api_key: &str, address: &str) -> String {
    format!(
        "{}?key={}&q={}&zoom=11&maptype=satellite",
        MAPS_EMBED_URL,
        urlencoding::encode(api_key),
        urlencoding::encode(address)
    )
}
