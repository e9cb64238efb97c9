/// Durations arrive as JSON numbers, sometimes fractional. Anything that is
/// not a finite non-negative number is dropped.
pub mod millis {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(value
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.round() as u64))
    }
}

/// Keeps an explicit `null` apart from a missing key: with `#[serde(default)]`
/// a missing key stays `None` while `null` reaches `T` as a value.
pub mod present {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        T::deserialize(deserializer).map(Some)
    }
}
