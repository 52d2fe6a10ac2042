use serde::Serialize;

use serde_json::Map;
use serde_json::Value;

/// A subscriber's watch policy, also the `WATCH` reply.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename = "WATCH", tag = "class")]
pub struct Watch {
    pub enable: bool,
    pub json: bool,
    pub nmea: bool,
    /// 0 off, 1 text verbatim and binary hex-dumped, 2 everything verbatim.
    pub raw: u8,
    pub scaled: bool,
    pub timing: bool,
    pub split24: bool,
    pub pps: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing)]
    pub remote: Option<String>,
}

fn boolean(key: &str, value: &Value) -> Result<bool, String> {
    value
        .as_bool()
        .ok_or_else(|| format!("attribute {} must be a boolean", key))
}

fn string(key: &str, value: &Value) -> Result<Option<String>, String> {
    match value.as_str() {
        Some("") => Ok(None),
        Some(s) => Ok(Some(s.to_string())),
        None => Err(format!("attribute {} must be a string", key)),
    }
}

impl Watch {
    /// Apply a `?WATCH=` object.
    ///
    /// Attributes missing from `request` fall back to their defaults (`enable` true, the
    /// others off, no device) except `json`, `nmea` and `raw` which keep their current value.
    /// Unknown attributes are ignored.  On error the policy is unchanged.
    pub fn update(&mut self, request: &Value) -> Result<(), String> {
        let object: &Map<String, Value> = request
            .as_object()
            .ok_or_else(|| "expected a JSON object".to_string())?;

        let mut next = Watch {
            enable: true,
            json: self.json,
            nmea: self.nmea,
            raw: self.raw,
            ..Watch::default()
        };

        for (key, value) in object {
            match key.as_str() {
                "class" => {
                    if value.as_str() != Some("WATCH") {
                        return Err("attribute class check failed".to_string());
                    }
                }
                "enable" => next.enable = boolean(key, value)?,
                "json" => next.json = boolean(key, value)?,
                "nmea" => next.nmea = boolean(key, value)?,
                "scaled" => next.scaled = boolean(key, value)?,
                "timing" => next.timing = boolean(key, value)?,
                "split24" => next.split24 = boolean(key, value)?,
                "pps" => next.pps = boolean(key, value)?,
                "raw" => {
                    next.raw = value
                        .as_u64()
                        .and_then(|raw| u8::try_from(raw).ok())
                        .ok_or_else(|| "attribute raw must be a small integer".to_string())?
                }
                "device" => next.device = string(key, value)?,
                "remote" => next.remote = string(key, value)?,
                _ => (),
            }
        }

        *self = next;

        Ok(())
    }

    /// Does this policy receive reports from the device at `path`?
    pub fn subscribed(&self, path: &str) -> bool {
        self.enable
            && match &self.device {
                None => true,
                Some(device) => device == path,
            }
    }

    /// Wants any raw packet forwarding.
    pub fn wants_packets(&self) -> bool {
        self.raw > 0 || self.nmea
    }
}
