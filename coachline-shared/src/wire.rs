//! Seat numbers are integers in memory and decimal strings on the wire.
//! Deserialization accepts either form.

use serde::{de, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum SeatLabel {
    Number(u32),
    Text(String),
}

impl SeatLabel {
    fn into_seat<E: de::Error>(self) -> Result<u32, E> {
        match self {
            SeatLabel::Number(n) => Ok(n),
            SeatLabel::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid seat number: {}", s))),
        }
    }
}

pub mod seat_number {
    use super::*;

    pub fn serialize<S: Serializer>(seat: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(seat)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        SeatLabel::deserialize(deserializer)?.into_seat()
    }
}

pub mod seat_numbers {
    use super::*;

    pub fn serialize<S: Serializer>(seats: &[u32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(seats.iter().map(|s| s.to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u32>, D::Error> {
        Vec::<SeatLabel>::deserialize(deserializer)?
            .into_iter()
            .map(SeatLabel::into_seat)
            .collect()
    }
}
