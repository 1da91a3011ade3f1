use std::collections::BTreeSet;

use crate::CatalogError;

/// Parses requested seat labels into seat numbers in `1..=capacity`, keeping request order.
///
/// Runs before any claim is attempted, so a bad label never touches the index.
pub fn parse_seat_numbers(raw: &[String], capacity: u32) -> Result<Vec<u32>, CatalogError> {
    let mut seen = BTreeSet::new();
    let mut seats = Vec::with_capacity(raw.len());

    for label in raw {
        let seat: u32 = label
            .trim()
            .parse()
            .map_err(|_| CatalogError::InvalidSeatNumber(label.clone()))?;

        if seat == 0 || seat > capacity {
            return Err(CatalogError::InvalidSeatNumber(format!(
                "{} (bus has {} seats)",
                label, capacity
            )));
        }

        if !seen.insert(seat) {
            return Err(CatalogError::DuplicateSeat(seat));
        }
        seats.push(seat);
    }

    Ok(seats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn accepts_seats_within_capacity() {
        let seats = parse_seat_numbers(&labels(&["12", " 1 ", "40"]), 40).unwrap();
        assert_eq!(seats, vec![12, 1, 40]);
    }

    #[test]
    fn rejects_non_numeric_and_out_of_range() {
        assert!(matches!(
            parse_seat_numbers(&labels(&["A3"]), 40),
            Err(CatalogError::InvalidSeatNumber(_))
        ));
        assert!(matches!(
            parse_seat_numbers(&labels(&["0"]), 40),
            Err(CatalogError::InvalidSeatNumber(_))
        ));
        assert!(matches!(
            parse_seat_numbers(&labels(&["41"]), 40),
            Err(CatalogError::InvalidSeatNumber(_))
        ));
        assert!(matches!(
            parse_seat_numbers(&labels(&["-2"]), 40),
            Err(CatalogError::InvalidSeatNumber(_))
        ));
    }

    #[test]
    fn rejects_duplicates() {
        assert_eq!(
            parse_seat_numbers(&labels(&["5", "05"]), 40),
            Err(CatalogError::DuplicateSeat(5))
        );
    }
}
