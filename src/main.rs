use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{debug, warn};

use wrendb::error::{DbError, DbResult};
use wrendb::sql::ast::Statement;
use wrendb::sql::parser::parse_statement;
use wrendb::storage::page::{
    COMMON_NODE_HEADER_SIZE, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE, LEAF_NODE_MAX_CELLS,
    LEAF_NODE_SPACE_FOR_CELLS,
};
use wrendb::storage::row::ROW_SIZE;
use wrendb::storage::table::Table;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "wrendb",
    version = VERSION,
    about = "Tiny persistent single-table database."
)]
struct Cli {
    /// Path to the database file (created on first use).
    file: PathBuf,
}

enum MetaResult {
    Continue,
    Exit,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let mut table = match Table::open(&cli.file) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut input = String::new();
    loop {
        print!("db > ");
        if io::stdout().flush().is_err() {
            return ExitCode::FAILURE;
        }

        input.clear();
        match io::stdin().read_line(&mut input) {
            Ok(0) => break, // EOF closes the table like .exit
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error reading input: {e}");
                return ExitCode::FAILURE;
            }
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('.') {
            match do_meta_command(line, &mut table) {
                Ok(MetaResult::Continue) => continue,
                Ok(MetaResult::Exit) => break,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }

        let statement = match parse_statement(line) {
            Ok(statement) => statement,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match execute_statement(statement, &mut table) {
            Ok(()) => println!("Executed."),
            Err(DbError::DuplicateKey(key)) => {
                warn!("rejected duplicate key {key}");
                println!("Error: Duplicate key.");
            }
            Err(e) => {
                // Fatal: nothing is flushed.
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    match table.close() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn do_meta_command(line: &str, table: &mut Table) -> DbResult<MetaResult> {
    match line {
        ".exit" => Ok(MetaResult::Exit),
        ".constants" => {
            print_constants();
            Ok(MetaResult::Continue)
        }
        ".btree" => {
            print!("Tree:\n{}", table.render_tree()?);
            Ok(MetaResult::Continue)
        }
        _ => {
            println!("Unrecognized command: '{line}'.");
            Ok(MetaResult::Continue)
        }
    }
}

fn print_constants() {
    println!("Constants:");
    println!("ROW_SIZE: {ROW_SIZE}");
    println!("COMMON_NODE_HEADER_SIZE: {COMMON_NODE_HEADER_SIZE}");
    println!("LEAF_NODE_HEADER_SIZE: {LEAF_NODE_HEADER_SIZE}");
    println!("LEAF_NODE_CELL_SIZE: {LEAF_NODE_CELL_SIZE}");
    println!("LEAF_NODE_SPACE_FOR_CELLS: {LEAF_NODE_SPACE_FOR_CELLS}");
    println!("LEAF_NODE_MAX_CELLS: {LEAF_NODE_MAX_CELLS}");
}

fn execute_statement(statement: Statement, table: &mut Table) -> DbResult<()> {
    match statement {
        Statement::Insert(row) => {
            debug!("executing insert, id={}", row.id());
            table.insert(&row)
        }
        Statement::Select => {
            debug!("executing select");
            for row in table.select()? {
                println!("{row}");
            }
            Ok(())
        }
    }
}
