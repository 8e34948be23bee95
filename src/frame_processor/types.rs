// SPDX-License-Identifier: MPL-2.0

//! Results of frame analysis

/// Axis-aligned box inside a frame, in fractions of the frame size
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRegion {
    /// Distance of the left edge from the frame's left side
    pub x: f32,
    /// Distance of the top edge from the frame's top
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FrameRegion {
    /// Normalize a pixel rectangle against the frame size
    pub fn from_pixels(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        Self {
            x: x as f32 / frame_width as f32,
            y: y as f32 / frame_height as f32,
            width: width as f32 / frame_width as f32,
            height: height as f32 / frame_height as f32,
        }
    }
}

/// A decoded QR code and where it sits in the frame
#[derive(Debug, Clone, PartialEq)]
pub struct QrDetection {
    /// Bounding box in normalized frame coordinates
    pub bounds: FrameRegion,
    /// Decoded text
    pub content: String,
}

impl QrDetection {
    pub fn new(bounds: FrameRegion, content: String) -> Self {
        Self { bounds, content }
    }
}

/// What kind of data a scanned payload carries
///
/// Used when presenting history entries; the stored payload itself is
/// always kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadKind {
    /// Web link
    Url,
    /// WiFi credentials (`WIFI:` format)
    Wifi { ssid: String },
    /// `tel:` URI
    Phone,
    /// `mailto:` URI
    Email,
    /// `sms:` / `smsto:` URI
    Sms,
    /// `geo:` URI
    Geo { latitude: f64, longitude: f64 },
    /// vCard / MECARD contact
    Contact,
    /// iCalendar event
    Event,
    /// Anything else
    Text,
}

impl PayloadKind {
    /// Classify a decoded payload
    pub fn classify(payload: &str) -> Self {
        let trimmed = payload.trim();
        let lower = trimmed.to_ascii_lowercase();

        if lower.starts_with("wifi:") {
            return Self::Wifi {
                ssid: wifi_ssid(&trimmed[5..]).unwrap_or_default(),
            };
        }
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Self::Url;
        }
        if lower.starts_with("tel:") {
            return Self::Phone;
        }
        if lower.starts_with("mailto:") {
            return Self::Email;
        }
        if lower.starts_with("sms:") || lower.starts_with("smsto:") {
            return Self::Sms;
        }
        if lower.starts_with("geo:") {
            if let Some((latitude, longitude)) = geo_coordinates(&trimmed[4..]) {
                return Self::Geo {
                    latitude,
                    longitude,
                };
            }
        }
        if lower.starts_with("begin:vcard") || lower.starts_with("mecard:") {
            return Self::Contact;
        }
        if lower.starts_with("begin:vcalendar") || lower.starts_with("begin:vevent") {
            return Self::Event;
        }
        if lower.starts_with("www.") && !lower.contains(' ') {
            return Self::Url;
        }

        Self::Text
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Url => "Link",
            Self::Wifi { .. } => "WiFi network",
            Self::Phone => "Phone number",
            Self::Email => "Email",
            Self::Sms => "SMS",
            Self::Geo { .. } => "Location",
            Self::Contact => "Contact",
            Self::Event => "Calendar event",
            Self::Text => "Text",
        }
    }
}

/// Extract the SSID from the body of a `WIFI:` payload (`S:<ssid>;...`)
fn wifi_ssid(body: &str) -> Option<String> {
    let mut rest = body;
    while !rest.is_empty() {
        // Fields end at the first unescaped ';'
        let mut end = rest.len();
        let mut escaped = false;
        for (i, c) in rest.char_indices() {
            match c {
                '\\' if !escaped => escaped = true,
                ';' if !escaped => {
                    end = i;
                    break;
                }
                _ => escaped = false,
            }
        }
        let field = &rest[..end];
        if let Some(value) = field.strip_prefix("S:") {
            return Some(
                value
                    .replace("\\;", ";")
                    .replace("\\:", ":")
                    .replace("\\,", ",")
                    .replace("\\\\", "\\"),
            );
        }
        rest = rest.get(end + 1..).unwrap_or("");
    }
    None
}

/// Parse `lat,lon[,alt][?query]`
fn geo_coordinates(body: &str) -> Option<(f64, f64)> {
    let coords = body.split('?').next()?;
    let mut parts = coords.split(',');
    let latitude = parts.next()?.trim().parse::<f64>().ok()?;
    let longitude = parts.next()?.trim().parse::<f64>().ok()?;
    Some((latitude, longitude))
}
