//! Fake-data helpers exposed to templates.
//!
//! ```text
//! {"id": "{{ uuid() }}", "company": "{{ company() }}",
//!  "items": [{% for _ in weightedSequence() %}{{ randomInt(100) }}{% if not loop.last %},{% endif %}{% endfor %}]}
//! ```

use chrono::Local;
use fake::faker::address::en::{BuildingNumber, CityName, StateName, StreetName, ZipCode};
use fake::faker::company::en::{Buzzword, CompanyName};
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use minijinja::{Environment, Error, ErrorKind, Value};
use rand::Rng;
use std::fmt::Write;

/// (weight, sequence length) pairs used by `weightedSequence()`.
pub const WEIGHTED_LENGTHS: [(u32, usize); 6] =
    [(20, 1), (15, 3), (8, 10), (5, 100), (3, 1000), (1, 10_000)];

pub fn register(env: &mut Environment<'_>) {
    env.add_function("add", add);
    env.add_function("date", date);
    env.add_function("seq", seq);
    env.add_function("weightedSequence", weighted_sequence);
    env.add_function("uuid", unique_id);
    env.add_function("company", company);
    env.add_function("product", product);
    env.add_function("city", city);
    env.add_function("state", state);
    env.add_function("street", street);
    env.add_function("zipCode", zip_code);
    env.add_function("randomInt", random_int);
    env.add_function("description", description);
}

fn add(augend: i64, addend: i64) -> Result<i64, Error> {
    augend.checked_add(addend).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("add({augend}, {addend}) overflows a 64-bit integer"),
        )
    })
}

/// Current local time rendered with a strftime pattern.
fn date(format: String) -> Result<String, Error> {
    let mut out = String::new();
    write!(out, "{}", Local::now().format(&format)).map_err(|_| {
        Error::new(ErrorKind::InvalidOperation, format!("invalid date format '{format}'"))
    })?;
    Ok(out)
}

/// A list of `size` zeros, for `{% for _ in seq(n) %}` loops.
fn seq(size: usize) -> Value {
    Value::from_serialize(vec![0u8; size])
}

fn weighted_sequence() -> Value {
    seq(weighted_length(&mut rand::thread_rng()))
}

pub fn weighted_length<R: Rng>(rng: &mut R) -> usize {
    let total: u32 = WEIGHTED_LENGTHS.iter().map(|(weight, _)| weight).sum();
    let mut roll = rng.gen_range(0..total);
    for (weight, length) in WEIGHTED_LENGTHS {
        if roll < weight {
            return length;
        }
        roll -= weight;
    }
    WEIGHTED_LENGTHS[WEIGHTED_LENGTHS.len() - 1].1
}

fn unique_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn company() -> String {
    CompanyName().fake()
}

fn product() -> String {
    Buzzword().fake()
}

fn city() -> String {
    CityName().fake()
}

fn state() -> String {
    StateName().fake()
}

fn street() -> String {
    let number: String = BuildingNumber().fake();
    let name: String = StreetName().fake();
    format!("{number} {name}")
}

fn zip_code() -> String {
    ZipCode().fake()
}

/// Uniform integer in `[1, n - 1]`.
fn random_int(n: i64) -> Result<i64, Error> {
    if n < 2 {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("randomInt needs an upper bound of at least 2, got {n}"),
        ));
    }
    Ok(rand::thread_rng().gen_range(1..n))
}

fn description() -> String {
    Sentence(4..10).fake()
}
