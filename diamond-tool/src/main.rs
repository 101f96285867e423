use diamond_schema::{ChildSpec, Compiler, Position, Schema};
use diamond_tree::{read, LostElements, LostSource, NodeId, Tree, WriteOptions};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process::exit;
use structopt::StructOpt;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, StructOpt)]
#[structopt(name = "diamond", about = "Schema-driven editing of XML options files")]
enum Cli {
    /// Print the schema with all <include>s resolved
    Preprocess { schema: PathBuf },
    /// List the valid children of a schema position (the start pattern by default)
    Children {
        schema: PathBuf,
        schema_path: Option<String>,
    },
    /// Read a document against the schema and report its validity
    Read { schema: PathBuf, xml: PathBuf },
    /// Read a document against the schema and write it back out
    Rewrite {
        schema: PathBuf,
        xml: PathBuf,
        /// Output file, standard output if absent
        #[structopt(short = "o", long = "output")]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
    match Cli::from_args() {
        Cli::Preprocess { schema } => preprocess(&schema),
        Cli::Children {
            schema,
            schema_path,
        } => children(&schema, schema_path.as_deref()),
        Cli::Read { schema, xml } => read_document(&schema, &xml),
        Cli::Rewrite {
            schema,
            xml,
            output,
        } => rewrite(&schema, &xml, output.as_deref()),
    }
}

fn preprocess(schema: &Path) {
    match diamond_grammar::preprocess(schema) {
        Ok(text) => print!("{}", text),
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    }
}

fn compile(schema: &Path) -> Schema {
    let mut compiler = Compiler::default();
    match compiler.compile(schema) {
        Ok(s) => {
            debug!("compiled {}", schema.display());
            s
        }
        Err(err) => {
            compiler.dump_diagnostic(&err);
            exit(1);
        }
    }
}

fn children(schema: &Path, schema_path: Option<&str>) {
    let s = compile(schema);
    let position = match schema_path {
        Some(path) => Position::Path(path),
        None => Position::Start,
    };
    let specs = match s.valid_children(position) {
        Ok(specs) => specs,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };
    for spec in specs {
        match &spec {
            ChildSpec::Element(e) => {
                println!("{}{} {}", e.name, e.cardinality.token(), e.schema_path);
                for (name, attr) in &e.attributes {
                    let required = if attr.required { "" } else { "?" };
                    println!("    @{}{} {}", name, required, attr.datatype);
                }
                if e.datatype != diamond_schema::Datatype::None {
                    println!("    data {}", e.datatype);
                }
            }
            ChildSpec::Choice(c) => {
                println!("({}){} {}", spec.name(), c.cardinality.token(), c.schema_path);
                for alt in &c.alternatives {
                    println!("    {} {}", alt.name, alt.schema_path);
                }
            }
        }
    }
}

fn load(schema: &Path, xml: &Path) -> (Tree, LostElements) {
    let s = compile(schema);
    let text = match fs::read_to_string(xml) {
        Ok(t) => t,
        Err(err) => {
            eprintln!("{}: {}", xml.display(), err);
            exit(1);
        }
    };
    match read(&s, &text) {
        Ok(r) => r,
        Err(err) => {
            eprintln!("{}: {}", xml.display(), err);
            exit(1);
        }
    }
}

fn print_node(tree: &Tree, id: NodeId, depth: usize) {
    let e = tree.current_element(id);
    let mut line = format!("{:indent$}{}", "", e.name(), indent = depth * 2);
    for (name, attr) in e.attrs() {
        if let Some(value) = attr.value() {
            line.push_str(&format!(" {}={:?}", name, value));
        }
    }
    if let Some(data) = e.data() {
        line.push_str(&format!(" = {:?}", data));
    }
    if !e.is_valid() {
        line.push_str("  [invalid]");
    }
    println!("{}", line);
    for child in tree.active_children(id) {
        print_node(tree, child, depth + 1);
    }
}

fn report_lost(lost: &LostElements) {
    for l in lost.iter() {
        match &l.source {
            LostSource::Document => eprintln!("lost: {}", l.xml),
            LostSource::Hidden { schema_path } => {
                eprintln!("lost (inactive {}): {}", schema_path, l.xml)
            }
        }
    }
}

fn read_document(schema: &Path, xml: &Path) {
    let (tree, lost) = load(schema, xml);
    print_node(&tree, tree.root(), 0);
    report_lost(&lost);
    let valid = tree.is_valid(tree.root());
    println!(
        "{}: {}, {} lost element(s)",
        xml.display(),
        if valid { "valid" } else { "invalid" },
        lost.len()
    );
    if !valid || !lost.is_empty() {
        exit(2);
    }
}

fn rewrite(schema: &Path, xml: &Path, output: Option<&Path>) {
    let (tree, lost) = load(schema, xml);
    report_lost(&lost);
    let opts = WriteOptions::default();
    let result = match output {
        Some(path) => match File::create(path) {
            Ok(f) => tree.write(BufWriter::new(f), &opts),
            Err(err) => {
                eprintln!("{}: {}", path.display(), err);
                exit(1);
            }
        },
        None => tree.write(io::stdout().lock(), &opts),
    };
    if let Err(err) = result {
        eprintln!("writing output failed: {}", err);
        exit(1);
    }
}
