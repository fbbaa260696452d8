use clap::{Arg, Command};
use std::io::{self, Write};
use user_ingest::HEADER;
use uuid::Uuid;

const STATUSES: [&str; 4] = ["employed", "self-employed", "unemployed", "student"];

fn every(matches: &clap::ArgMatches, name: &str) -> u64 {
    matches.get_one::<u64>(name).copied().unwrap_or(0)
}

fn hits(i: u64, n: u64) -> bool {
    n > 0 && i % n == n - 1
}

fn main() -> anyhow::Result<()> {
    let matches = Command::new("gen")
        .about("Write a deterministic user CSV to stdout")
        .arg(
            Arg::new("rows")
                .long("rows")
                .value_parser(clap::value_parser!(u64))
                .required(true),
        )
        .arg(
            Arg::new("empty-email-every")
                .long("empty-email-every")
                .help("Blank the email of every Nth row")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("bad-id-every")
                .long("bad-id-every")
                .help("Write an unparseable id on every Nth row")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("ragged-every")
                .long("ragged-every")
                .help("Drop the trailing columns of every Nth row")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("duplicate-every")
                .long("duplicate-every")
                .help("Reuse the first row's email on every Nth row")
                .value_parser(clap::value_parser!(u64)),
        )
        .get_matches();

    let rows = matches.get_one::<u64>("rows").copied().unwrap_or(0);
    let empty_email = every(&matches, "empty-email-every");
    let bad_id = every(&matches, "bad-id-every");
    let ragged = every(&matches, "ragged-every");
    let duplicate = every(&matches, "duplicate-every");

    let mut out = io::BufWriter::new(io::stdout().lock());
    writeln!(&mut out, "{}", HEADER.join(","))?;

    for i in 0..rows {
        let id = Uuid::from_u128(u128::from(i) + 1);
        if hits(i, ragged) {
            writeln!(&mut out, "{id},User {i}")?;
            continue;
        }

        let id = if hits(i, bad_id) {
            format!("bad-{i}")
        } else {
            id.to_string()
        };
        let email = if hits(i, empty_email) {
            String::new()
        } else if hits(i, duplicate) {
            "user0@example.com".to_string()
        } else {
            format!("user{i}@example.com")
        };

        writeln!(
            &mut out,
            "{id},User {i},{email},{}.{:02},{},{},{}",
            2_000 + (i * 37) % 9_000,
            i % 100,
            300 + (i * 7) % 550,
            STATUSES[(i % 4) as usize],
            18 + i % 60,
        )?;
        if i % 10_000 == 0 {
            out.flush()?;
        } // keep buffers moving on huge runs
    }

    out.flush()?;
    Ok(())
}
