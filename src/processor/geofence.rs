use crate::geo::{self, Coordinate};
use crate::models::geofence::Geofence;

/// Every zone whose circle contains `point`, boundary included, in input order.
pub fn match_zones(point: Coordinate, zones: &[Geofence]) -> Vec<&Geofence> {
    zones
        .iter()
        .filter(|zone| {
            geo::distance(point, zone.center).is_some_and(|meters| meters <= zone.radius_m)
        })
        .collect()
}

/// Zone and destination names compare trimmed and case-insensitively.
pub fn names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::geofence::ZoneKind;
    use uuid::Uuid;

    fn zone(name: &str, kind: ZoneKind, center: Coordinate, radius_m: f64) -> Geofence {
        Geofence {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind,
            center,
            radius_m,
            color: None,
        }
    }

    #[test]
    fn test_nested_zones_all_match() {
        let center = Coordinate::new(27.1536, -13.2033);
        let zones = vec![
            zone("Laayoune", ZoneKind::CityBoundary, center, 5000.0),
            zone("Laayoune", ZoneKind::Warehouse, Coordinate::new(27.1500, -13.2000), 300.0),
            zone("Dakhla", ZoneKind::CityBoundary, Coordinate::new(23.6848, -15.9580), 5000.0),
        ];

        let matched = match_zones(Coordinate::new(27.1500, -13.2000), &zones);
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|z| z.name == "Laayoune"));
    }

    #[test]
    fn test_boundary_point_is_inside() {
        let center = Coordinate::new(27.1536, -13.2033);
        let point = Coordinate::new(27.1600, -13.2033);
        let d = geo::distance(point, center).unwrap();

        let exact = [zone("Laayoune", ZoneKind::CityBoundary, center, d)];
        assert_eq!(match_zones(point, &exact).len(), 1);

        let just_short = [zone("Laayoune", ZoneKind::CityBoundary, center, d - 1e-6)];
        assert!(match_zones(point, &just_short).is_empty());
    }

    #[test]
    fn test_no_zones_no_matches() {
        assert!(match_zones(Coordinate::new(0.0, 0.0), &[]).is_empty());
    }

    #[test]
    fn test_names_match_ignores_case_and_padding() {
        assert!(names_match("Laayoune", " laayoune "));
        assert!(names_match("DAKHLA", "Dakhla"));
        assert!(!names_match("Laayoune", "Laayoune Plage"));
        assert!(!names_match("Smara", ""));
    }
}
