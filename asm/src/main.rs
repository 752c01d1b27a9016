use arch::isa::InstructionSet;
use color_print::cprintln;
use stackasm::assembler::Assembler;
use stackasm::disasm::disassemble;
use stackasm::dump::print_dump;
use stackasm::source::Source;
use stackasm::tables::ReservedSlot;
use stackasm::unit::CodeUnit;

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input listing (or YAML unit with --disassemble)
    #[clap(default_value = "main.pyasm")]
    input: String,

    /// Output file [default: <input>.bin, or stdout with --disassemble]
    #[clap(short, long)]
    output: Option<String>,

    /// Also write the assembled unit as YAML
    #[clap(short, long)]
    unit: Option<String>,

    /// Dump assembled code
    #[clap(short, long)]
    dump: bool,

    /// Parameter names, first local slots
    #[clap(short, long, value_delimiter = ',')]
    params: Vec<String>,

    /// Line number of the line before the listing
    #[clap(long, default_value_t = 0)]
    first_line: usize,

    /// Content of constant slot 0
    #[clap(long, value_enum, default_value_t = ReservedSlot::None)]
    reserved: ReservedSlot,

    /// Read a YAML unit and print its listing
    #[clap(long)]
    disassemble: bool,
}

fn main() {
    use clap::Parser;

    let args: Args = Args::parse();
    let ok = if args.disassemble {
        run_disassemble(&args)
    } else {
        run_assemble(&args)
    };
    if !ok {
        std::process::exit(1);
    }
}

fn run_assemble(args: &Args) -> bool {
    println!("Stack Assembler");

    println!("1. Read Source");
    println!("  < {}", args.input);
    let Some(text) = read(&args.input) else {
        return false;
    };
    let source = Source::parse(&text);

    println!("2. Assemble");
    let assembler = Assembler::default()
        .params(args.params.as_slice())
        .first_line(args.first_line)
        .reserved(args.reserved);
    let unit = match assembler.assemble_source(&source) {
        Ok(unit) => unit,
        Err(err) => {
            let lines: Vec<&str> = text.lines().collect();
            err.print_diag(&args.input, &lines, source.header_lines());
            return false;
        }
    };
    cprintln!(
        "  <g>ok</>: {} bytes, {} consts, {} labels",
        unit.code.len(),
        unit.consts.len(),
        unit.symbols.len()
    );

    println!("3. Write Binary");
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| format!("{}.bin", args.input));
    println!("  > {}", output);
    if !write(&output, &unit.code) {
        return false;
    }

    if let Some(path) = &args.unit {
        println!("4. Write Unit");
        println!("  > {}", path);
        let yaml = match serde_yaml::to_string(&unit) {
            Ok(yaml) => yaml,
            Err(err) => {
                cprintln!("<r,s>Failed to serialize unit</>: {}", err);
                return false;
            }
        };
        if !write(path, yaml.as_bytes()) {
            return false;
        }
    }

    if args.dump {
        if let Err(err) = print_dump(&unit, assembler.isa()) {
            cprintln!("<r,s>error</>: {}", err);
            return false;
        }
    }
    true
}

fn run_disassemble(args: &Args) -> bool {
    let Some(text) = read(&args.input) else {
        return false;
    };
    let unit: CodeUnit = match serde_yaml::from_str(&text) {
        Ok(unit) => unit,
        Err(err) => {
            cprintln!("<r,s>Failed to parse unit</>: {}: {}", args.input, err);
            return false;
        }
    };
    let listing = match disassemble(&unit, InstructionSet::cpython37()) {
        Ok(listing) => listing,
        Err(err) => {
            cprintln!("<r,s>error</>: {}", err);
            return false;
        }
    };
    match &args.output {
        Some(path) => write(path, listing.as_bytes()),
        None => {
            print!("{}", listing);
            true
        }
    }
}

fn read(path: &str) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(err) => {
            cprintln!("<r,s>Failed to open File</>: {}: {}", path, err);
            None
        }
    }
}

fn write(path: &str, bytes: &[u8]) -> bool {
    match std::fs::write(path, bytes) {
        Ok(()) => true,
        Err(err) => {
            cprintln!("<r,s>Failed to write File</>: {}: {}", path, err);
            false
        }
    }
}
