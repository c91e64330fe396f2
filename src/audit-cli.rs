//! A CLI tool for auditing an election offline.
//! It reads the dump served by the backend and checks it with the same
//! hashing code the server uses when votes are submitted.

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;

use electzone_backend::model::{
    audit::{AuditFailure, ElectionDump},
    results::PositionResults,
};

const PROGRAM_NAME: &str = "audit-electzone";

const ABOUT_TEXT: &str = "Audit the integrity of a school election.

EXIT CODES:
     0: Verification succeeded.
   255: Ran successfully, but verification failed.
 Other: Error.";

const DUMP_PATH: &str = "DUMP_PATH";

const DUMP_PATH_HELP: &str = "The path to a JSON dump of an election,\n\
as returned by `GET /elections/<election_id>/dump`";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME).about(ABOUT_TEXT).arg(
        Arg::new(DUMP_PATH)
            .help(DUMP_PATH_HELP)
            .action(ArgAction::Set)
            .required(true),
    )
}

/// Errors that this program may produce.
#[derive(Debug, Eq, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON dump.
    Format(String),
    /// Verification failed for the contained reasons.
    Verification(Vec<AuditFailure>),
}

/// One position's tally, ready for printing.
#[derive(Debug, Eq, PartialEq)]
struct PositionTally {
    position: String,
    /// Candidate name and vote count, highest first.
    counts: Vec<(String, u64)>,
}

impl From<&PositionResults> for PositionTally {
    fn from(results: &PositionResults) -> Self {
        Self {
            position: results.position.clone(),
            counts: results
                .candidates
                .iter()
                .map(|c| (c.name.clone(), c.vote_count))
                .collect(),
        }
    }
}

impl Display for PositionTally {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}:", self.position)?;
        for (name, count) in self.counts.iter() {
            writeln!(
                f,
                "  {name}: {count} vote{}",
                if *count != 1 { "s" } else { "" }
            )?;
        }
        Ok(())
    }
}

/// Run verification.
fn verify(path: &str) -> Result<Vec<PositionTally>, Error> {
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let dump: ElectionDump =
        serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;

    let report = dump.audit();
    if !report.is_verified() {
        return Err(Error::Verification(report.failures));
    }

    Ok(report
        .results
        .positions
        .iter()
        .map(PositionTally::from)
        .collect())
}

/// Run verification, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let path: &String = args.get_one(DUMP_PATH).unwrap(); // Required argument is guaranteed to be present.
    match verify(path) {
        Ok(tallies) => {
            println!("Verification succeeded.");
            for tally in tallies {
                print!("{tally}");
            }
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {msg}");
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid JSON: {msg}");
            1
        }
        Err(Error::Verification(failures)) => {
            println!("Verification failed:");
            for failure in failures {
                println!("  {failure}");
            }
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::{Duration, Utc};
    use electzone_backend::model::{
        candidate::{Ballot, Candidate, CandidateSpec},
        election::{Election, ElectionSpec},
        vote::{SelectionSet, VoteRecord, VoteToken},
    };
    use electzone_backend::protocol::{build_payload, hash_payload};
    use tempfile::NamedTempFile;

    use super::*;

    /// A two-position election with three votes: two for Alice and Carol,
    /// one for Bob and Dan.
    fn example_dump() -> ElectionDump {
        let now = Utc::now();
        let election = Election::from_spec(ElectionSpec {
            title: "Audit Test".to_string(),
            start_at: now - Duration::hours(1),
            end_at: now + Duration::hours(1),
        });
        let candidates: Vec<Candidate> = [
            ("Alice", "President"),
            ("Bob", "President"),
            ("Carol", "Treasurer"),
            ("Dan", "Treasurer"),
        ]
        .into_iter()
        .map(|(name, position)| {
            Candidate::from_spec(
                election.id,
                CandidateSpec {
                    name: name.to_string(),
                    party: String::new(),
                    position: position.to_string(),
                },
            )
        })
        .collect();
        let ballot = Ballot::new(election, candidates);

        let votes = [(0, 2), (0, 2), (1, 3)]
            .into_iter()
            .map(|(president, treasurer)| {
                let selections: SelectionSet = [
                    ("President".to_string(), ballot.candidates[president].id),
                    ("Treasurer".to_string(), ballot.candidates[treasurer].id),
                ]
                .into_iter()
                .collect();
                let payload = build_payload(&selections, &ballot, now).unwrap();
                VoteRecord {
                    vote_token: VoteToken::generate(),
                    election_id: ballot.election.id,
                    payload_hash: hash_payload(&payload),
                    payload,
                }
            })
            .collect();

        ElectionDump {
            election: ballot.election,
            candidates: ballot.candidates,
            votes,
        }
    }

    fn write_dump(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn path(file: &NamedTempFile) -> &str {
        file.path().to_str().unwrap()
    }

    #[test]
    fn verification() {
        // This test actually enters backend code, so enable logging.
        log4rs_test_utils::test_logging::init_logging_once_for(
            ["electzone_backend"],
            None,
            None,
        );

        let dump = example_dump();
        let file = write_dump(&serde_json::to_string(&dump).unwrap());
        let expected = vec![
            PositionTally {
                position: "President".to_string(),
                counts: vec![("Alice".to_string(), 2), ("Bob".to_string(), 1)],
            },
            PositionTally {
                position: "Treasurer".to_string(),
                counts: vec![("Carol".to_string(), 2), ("Dan".to_string(), 1)],
            },
        ];
        assert_eq!(verify(path(&file)), Ok(expected));

        // Swap the payloads of two votes that chose differently.
        let mut tampered = dump;
        let payload = tampered.votes[0].payload.clone();
        tampered.votes[0].payload = tampered.votes[2].payload.clone();
        tampered.votes[2].payload = payload;
        let file = write_dump(&serde_json::to_string(&tampered).unwrap());
        assert_eq!(
            verify(path(&file)),
            Err(Error::Verification(vec![
                AuditFailure::Tampered(tampered.votes[0].vote_token),
                AuditFailure::Tampered(tampered.votes[2].vote_token),
            ]))
        );
    }

    #[test]
    fn correct_cli_usage() {
        let good = write_dump(&serde_json::to_string(&example_dump()).unwrap());
        let command_line = [PROGRAM_NAME, path(&good)];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 0);

        let mut dump = example_dump();
        dump.votes[1].payload_hash = dump.votes[2].payload_hash.clone();
        let bad = write_dump(&serde_json::to_string(&dump).unwrap());
        let command_line = [PROGRAM_NAME, path(&bad)];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 255);

        let malformed = write_dump("{\"election\": ");
        let command_line = [PROGRAM_NAME, path(&malformed)];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);

        let command_line = [PROGRAM_NAME, "not a real file"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);
    }

    #[test]
    fn bad_cli_usage() {
        // Something very wrong.
        let command_line = [PROGRAM_NAME, "this", "invocation", "is", "incorrect"];
        cli().try_get_matches_from(command_line).unwrap_err();

        // No options at all.
        let command_line = [PROGRAM_NAME];
        cli().try_get_matches_from(command_line).unwrap_err();
    }
}
