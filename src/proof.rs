// Groth16 proof documents produced by snarkjs and their flattened calldata form

use std::fs;
use std::path::Path;
use std::str::FromStr;

use ark_bn254::{Fq, Fr};
use ark_ff::PrimeField;
use num_bigint::BigUint;
use num_traits::Num;
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::{PipelineError, Result};

/// Proof coordinates live in the BN254 base field.
static BASE_FIELD_MODULUS: Lazy<BigUint> = Lazy::new(|| <Fq as PrimeField>::MODULUS.into());
/// Public signals live in the BN254 scalar field.
static SCALAR_FIELD_MODULUS: Lazy<BigUint> = Lazy::new(|| <Fr as PrimeField>::MODULUS.into());

/// A groth16 proof flattens to A.x, A.y, B.x0, B.x1, B.y0, B.y1, C.x, C.y.
pub const GROTH16_TOKEN_COUNT: usize = 8;

/// Lines of this length or shorter are structural in snarkjs' pretty-printed output.
pub const LEGACY_LINE_THRESHOLD: usize = 25;

const LEGACY_STRIPPED: [char; 6] = [' ', ',', '\r', '\n', '\t', '"'];

/// Line-filter flattening of a pretty-printed proof document.
///
/// Every line longer than [`LEGACY_LINE_THRESHOLD`] characters (counting its
/// line terminator, `\r\n` as one character) is stripped of spaces, commas, CR/LF, tabs and double
/// quotes and appended followed by a comma. Never fails: a document with no
/// qualifying lines yields an empty string.
pub fn flatten_lines(text: &str) -> String {
    let mut out = String::new();
    for line in text.split_inclusive('\n') {
        let len = line.chars().count() - usize::from(line.ends_with("\r\n"));
        if len > LEGACY_LINE_THRESHOLD {
            out.extend(line.chars().filter(|c| !LEGACY_STRIPPED.contains(c)));
            out.push(',');
        }
    }
    out.retain(|c| c != ' ');
    out
}

/// G2 point as written by snarkjs (nested) or rapidsnark (flat).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum G2Coordinates {
    /// `[[x0, x1], [y0, y1], ["1", "0"]]`
    Nested(Vec<Vec<String>>),
    /// `[x0, x1, y0, y1, "1", "0"]`
    Flat(Vec<String>),
}

/// `proof.json` as emitted by `snarkjs groth16 prove`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProofDocument {
    pub pi_a: Vec<String>,
    pub pi_b: G2Coordinates,
    pub pi_c: Vec<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub curve: Option<String>,
}

impl ProofDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = read_document(path)?;
        Self::parse(&raw).map_err(|source| PipelineError::ProofParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(raw: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The eight affine coordinates in calldata order. Projective trailing
    /// coordinates (`"1"`, `["1", "0"]`) are dropped.
    pub fn tokens(&self) -> Result<Vec<Token>> {
        if let Some(protocol) = &self.protocol {
            if protocol != "groth16" {
                return Err(malformed(format!("unsupported protocol '{}'", protocol)));
            }
        }

        let mut raw: Vec<&str> = Vec::with_capacity(GROTH16_TOKEN_COUNT);
        raw.extend(g1_pair("pi_a", &self.pi_a)?);

        match &self.pi_b {
            G2Coordinates::Nested(rows) => {
                if rows.len() < 2 {
                    return Err(malformed(format!(
                        "pi_b: expected at least 2 rows, got {}",
                        rows.len()
                    )));
                }
                raw.extend(g1_pair("pi_b[0]", &rows[0])?);
                raw.extend(g1_pair("pi_b[1]", &rows[1])?);
            }
            G2Coordinates::Flat(values) => {
                if values.len() < 4 {
                    return Err(malformed(format!(
                        "pi_b: expected at least 4 elements, got {}",
                        values.len()
                    )));
                }
                raw.extend(values[..4].iter().map(String::as_str));
            }
        }

        raw.extend(g1_pair("pi_c", &self.pi_c)?);

        raw.into_iter().map(Token::parse_coordinate).collect()
    }
}

fn g1_pair<'a>(name: &str, values: &'a [String]) -> Result<[&'a str; 2]> {
    match values {
        [x, y, ..] => Ok([x.as_str(), y.as_str()]),
        _ => Err(malformed(format!(
            "{}: expected at least 2 elements, got {}",
            name,
            values.len()
        ))),
    }
}

/// `public.json`: the public signals written alongside the proof.
#[derive(Debug, Clone, Default)]
pub struct PublicSignals(pub Vec<BigUint>);

impl PublicSignals {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = read_document(path)?;
        let values: Vec<String> =
            serde_json::from_str(&raw).map_err(|source| PipelineError::ProofParse {
                path: path.to_path_buf(),
                source,
            })?;
        values
            .iter()
            .map(|v| parse_signal(v, &SCALAR_FIELD_MODULUS))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

/// Recovers and validates the tokens of a line-filter flattened proof.
/// The tokens keep their text, so a decimal rendering reproduces `flat` exactly.
pub fn tokens_from_flattened(flat: &str) -> Result<Vec<Token>> {
    let tokens: Vec<&str> = match flat.strip_suffix(',') {
        Some(body) => body.split(',').collect(),
        None => Vec::new(),
    };
    if tokens.len() != GROTH16_TOKEN_COUNT {
        return Err(malformed(format!(
            "expected {} proof elements, got {} from '{}'",
            GROTH16_TOKEN_COUNT,
            tokens.len(),
            flat
        )));
    }
    tokens.into_iter().map(Token::parse_coordinate).collect()
}

/// Proof coordinates: ASCII digits only, reduced modulo the base field.
pub fn parse_decimal_element(value: &str, modulus: &BigUint) -> Result<BigUint> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("'{}' is not a decimal field element", value)));
    }
    let parsed = BigUint::from_str(value)
        .map_err(|e| malformed(format!("'{}' is not a field element: {}", value, e)))?;
    check_reduced(value, parsed, modulus)
}

/// Public signals: decimal, or `0x`-prefixed hex as some provers emit.
pub fn parse_signal(value: &str, modulus: &BigUint) -> Result<BigUint> {
    match value.strip_prefix("0x") {
        Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            let parsed = BigUint::from_str_radix(hex, 16)
                .map_err(|e| malformed(format!("'{}' is not a field element: {}", value, e)))?;
            check_reduced(value, parsed, modulus)
        }
        Some(_) => Err(malformed(format!("'{}' is not a hex field element", value))),
        None => parse_decimal_element(value, modulus),
    }
}

fn check_reduced(value: &str, parsed: BigUint, modulus: &BigUint) -> Result<BigUint> {
    if &parsed >= modulus {
        return Err(malformed(format!("'{}' exceeds the field modulus", value)));
    }
    Ok(parsed)
}

pub fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| PipelineError::ProofRead {
        path: path.to_path_buf(),
        source,
    })
}

fn malformed(msg: String) -> PipelineError {
    PipelineError::MalformedProof(msg)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Encoding {
    #[default]
    Decimal,
    Hex,
}

/// One calldata element: the text it was read as and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub value: BigUint,
}

impl Token {
    pub fn from_value(value: BigUint) -> Self {
        Self {
            text: value.to_string(),
            value,
        }
    }

    fn parse_coordinate(text: &str) -> Result<Self> {
        Ok(Self {
            value: parse_decimal_element(text, &BASE_FIELD_MODULUS)?,
            text: text.to_string(),
        })
    }
}

/// Ordered calldata tokens, rendered comma-joined with a trailing comma.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedProof {
    pub tokens: Vec<Token>,
}

impl FlattenedProof {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn append_public(&mut self, signals: PublicSignals) {
        self.tokens.extend(signals.0.into_iter().map(Token::from_value));
    }

    /// Decimal output repeats each token's text verbatim.
    pub fn render(&self, encoding: Encoding) -> String {
        self.tokens
            .iter()
            .map(|t| match encoding {
                Encoding::Decimal => format!("{},", t.text),
                Encoding::Hex => format!("0x{:x},", t.value),
            })
            .collect()
    }
}
