//! Polygon geometry for feedback areas and labels.
//!
//! Polygons are WGS84 longitude/latitude. Input is accepted as WKT (optionally
//! EWKT-prefixed with `SRID=4326;`) or as a GeoJSON Polygon object; output is
//! always GeoJSON. WKT is the storage form.

use itertools::Itertools;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub type Position = [f64; 2];

pub const WGS84_SRID: u32 = 4326;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("Invalid WKT: {0}")]
    Syntax(String),
    #[error("Unsupported geometry type '{0}', expected Polygon.")]
    UnsupportedType(String),
    #[error("Unsupported SRID {0}, expected 4326.")]
    UnsupportedSrid(String),
    #[error("Polygon must have at least one ring.")]
    Empty,
    #[error("Ring {ring} has {count} positions, at least 4 are required.")]
    TooFewPositions { ring: usize, count: usize },
    #[error("Ring {ring} is not closed.")]
    NotClosed { ring: usize },
    #[error("Ring {ring} is degenerate (fewer than 3 distinct positions or zero area).")]
    Degenerate { ring: usize },
    #[error("Coordinate ({x}, {y}) is outside WGS84 bounds.")]
    OutOfBounds { x: f64, y: f64 },
    #[error("Coordinates must be finite numbers.")]
    NonFinite,
    #[error("Ring {ring} is a hole that lies outside the exterior ring.")]
    HoleOutsideShell { ring: usize },
}

/// A validated polygon: one exterior ring followed by zero or more holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    rings: Vec<Vec<Position>>,
}

impl Polygon {
    pub fn new(rings: Vec<Vec<Position>>) -> Result<Self, GeometryError> {
        if rings.is_empty() {
            return Err(GeometryError::Empty);
        }
        for (index, ring) in rings.iter().enumerate() {
            validate_ring(index, ring)?;
        }
        let polygon = Self { rings };
        polygon.validate_holes()?;
        Ok(polygon)
    }

    /// Parse a WKT or EWKT `POLYGON`.
    pub fn from_wkt(input: &str) -> Result<Self, GeometryError> {
        let body = strip_srid(input.trim())?;
        let mut cursor = WktCursor::new(body);

        let keyword = cursor.keyword();
        if keyword.is_empty() {
            return Err(GeometryError::Syntax("expected a geometry keyword".to_string()));
        }
        if !keyword.eq_ignore_ascii_case("POLYGON") {
            return Err(GeometryError::UnsupportedType(keyword.to_string()));
        }

        let modifier = cursor.keyword();
        if modifier.eq_ignore_ascii_case("EMPTY") {
            return Err(GeometryError::Empty);
        }
        if !modifier.is_empty() {
            return Err(GeometryError::Syntax(format!(
                "unexpected '{}' after POLYGON",
                modifier
            )));
        }

        cursor.expect('(')?;
        let mut rings = Vec::new();
        loop {
            cursor.expect('(')?;
            let mut ring = Vec::new();
            loop {
                let x = cursor.number()?;
                let y = cursor.number()?;
                ring.push([x, y]);
                if cursor.list_separator()? {
                    break;
                }
            }
            rings.push(ring);
            if cursor.list_separator()? {
                break;
            }
        }

        if !cursor.at_end() {
            return Err(GeometryError::Syntax(format!(
                "unexpected trailing input at position {}",
                cursor.pos
            )));
        }

        Self::new(rings)
    }

    /// Parse a GeoJSON geometry object of type `Polygon`.
    pub fn from_geojson(value: &serde_json::Value) -> Result<Self, GeometryError> {
        let kind = value
            .get("type")
            .and_then(|kind| kind.as_str())
            .ok_or_else(|| GeometryError::Syntax("GeoJSON object has no 'type'".to_string()))?;
        if kind != "Polygon" {
            return Err(GeometryError::UnsupportedType(kind.to_string()));
        }

        let coordinates = value
            .get("coordinates")
            .cloned()
            .ok_or_else(|| GeometryError::Syntax("GeoJSON polygon has no 'coordinates'".to_string()))?;
        let raw: Vec<Vec<Vec<f64>>> = serde_json::from_value(coordinates)
            .map_err(|e| GeometryError::Syntax(e.to_string()))?;

        let rings = raw
            .into_iter()
            .map(|ring| {
                ring.into_iter()
                    .map(|position| match position.as_slice() {
                        // A third (altitude) value is allowed by GeoJSON and dropped here.
                        [x, y, ..] => Ok([*x, *y]),
                        _ => Err(GeometryError::Syntax(
                            "positions need at least two coordinates".to_string(),
                        )),
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(rings)
    }

    /// Accept either a WKT string or a GeoJSON object.
    pub fn from_input(value: &serde_json::Value) -> Result<Self, GeometryError> {
        match value {
            serde_json::Value::String(wkt) => Self::from_wkt(wkt),
            serde_json::Value::Object(_) => Self::from_geojson(value),
            _ => Err(GeometryError::Syntax(
                "expected a WKT string or a GeoJSON object".to_string(),
            )),
        }
    }

    pub fn to_wkt(&self) -> String {
        let rings = self
            .rings
            .iter()
            .map(|ring| {
                format!(
                    "({})",
                    ring.iter().map(|[x, y]| format!("{} {}", x, y)).join(", ")
                )
            })
            .join(", ");
        format!("POLYGON({})", rings)
    }

    fn exterior(&self) -> &[Position] {
        &self.rings[0]
    }

    fn interiors(&self) -> &[Vec<Position>] {
        &self.rings[1..]
    }

    /// Every hole vertex must lie inside the exterior ring or on its boundary.
    fn validate_holes(&self) -> Result<(), GeometryError> {
        let exterior = self.exterior();
        for (offset, hole) in self.interiors().iter().enumerate() {
            if hole.iter().any(|position| !ring_contains(exterior, position)) {
                return Err(GeometryError::HoleOutsideShell { ring: offset + 1 });
            }
        }
        Ok(())
    }
}

fn validate_ring(index: usize, ring: &[Position]) -> Result<(), GeometryError> {
    for [x, y] in ring {
        if !x.is_finite() || !y.is_finite() {
            return Err(GeometryError::NonFinite);
        }
        if !(-180.0..=180.0).contains(x) || !(-90.0..=90.0).contains(y) {
            return Err(GeometryError::OutOfBounds { x: *x, y: *y });
        }
    }
    if ring.len() < 4 {
        return Err(GeometryError::TooFewPositions {
            ring: index,
            count: ring.len(),
        });
    }
    if ring.first() != ring.last() {
        return Err(GeometryError::NotClosed { ring: index });
    }

    let distinct = ring[..ring.len() - 1]
        .iter()
        .map(|[x, y]| (x.to_bits(), y.to_bits()))
        .unique()
        .count();
    if distinct < 3 || ring_area(ring) == 0.0 {
        return Err(GeometryError::Degenerate { ring: index });
    }
    Ok(())
}

/// Even-odd ray casting; positions on the boundary count as contained.
fn ring_contains(ring: &[Position], &[px, py]: &Position) -> bool {
    let mut inside = false;
    for (a, b) in ring.iter().tuple_windows() {
        if on_segment(a, b, px, py) {
            return true;
        }
        if (a[1] > py) != (b[1] > py) {
            let crossing = a[0] + (py - a[1]) * (b[0] - a[0]) / (b[1] - a[1]);
            if px < crossing {
                inside = !inside;
            }
        }
    }
    inside
}

fn on_segment(a: &Position, b: &Position, px: f64, py: f64) -> bool {
    let cross = (b[0] - a[0]) * (py - a[1]) - (b[1] - a[1]) * (px - a[0]);
    cross == 0.0
        && px >= a[0].min(b[0])
        && px <= a[0].max(b[0])
        && py >= a[1].min(b[1])
        && py <= a[1].max(b[1])
}

/// Signed shoelace area of a closed ring.
fn ring_area(ring: &[Position]) -> f64 {
    ring.iter()
        .tuple_windows()
        .map(|(a, b)| a[0] * b[1] - b[0] * a[1])
        .sum::<f64>()
        / 2.0
}

fn strip_srid(input: &str) -> Result<&str, GeometryError> {
    let Some(prefix) = input.get(..5) else {
        return Ok(input);
    };
    if !prefix.eq_ignore_ascii_case("SRID=") {
        return Ok(input);
    }
    let (srid, rest) = input[5..]
        .split_once(';')
        .ok_or_else(|| GeometryError::Syntax("SRID prefix is not terminated by ';'".to_string()))?;
    match srid.trim().parse::<u32>() {
        Ok(WGS84_SRID) => Ok(rest.trim_start()),
        _ => Err(GeometryError::UnsupportedSrid(srid.trim().to_string())),
    }
}

struct WktCursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> WktCursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        self.skip_whitespace();
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn keyword(&mut self) -> &'a str {
        self.take_while(|c| c.is_ascii_alphabetic())
    }

    fn number(&mut self) -> Result<f64, GeometryError> {
        let start = self.pos;
        let token = self.take_while(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
        if token.is_empty() {
            return Err(GeometryError::Syntax(format!(
                "expected a number at position {}",
                start
            )));
        }
        token
            .parse::<f64>()
            .map_err(|_| GeometryError::Syntax(format!("'{}' is not a number", token)))
    }

    fn next_char(&mut self) -> Option<char> {
        self.skip_whitespace();
        let c = self.rest().chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), GeometryError> {
        match self.next_char() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(GeometryError::Syntax(format!(
                "expected '{}' but found '{}'",
                expected, c
            ))),
            None => Err(GeometryError::Syntax(format!(
                "expected '{}' but input ended",
                expected
            ))),
        }
    }

    /// Consume `,` (returns false, list continues) or `)` (returns true, list closed).
    fn list_separator(&mut self) -> Result<bool, GeometryError> {
        match self.next_char() {
            Some(',') => Ok(false),
            Some(')') => Ok(true),
            Some(c) => Err(GeometryError::Syntax(format!(
                "expected ',' or ')' but found '{}'",
                c
            ))),
            None => Err(GeometryError::Syntax("unbalanced parentheses".to_string())),
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.rest().is_empty()
    }
}

impl FromStr for Polygon {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wkt(s)
    }
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wkt())
    }
}

#[derive(Serialize)]
struct GeoJsonPolygon<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: &'a [Vec<Position>],
}

impl Serialize for Polygon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        GeoJsonPolygon {
            kind: "Polygon",
            coordinates: &self.rings,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Polygon {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Polygon::from_input(&value).map_err(de::Error::custom)
    }
}
