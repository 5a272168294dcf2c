//! # gdsflat
//!
//! GDSII hierarchy-collapse driver: open a library, list its cells, or
//! flatten one of them to a new single-cell GDS file.
//!

use clap::Parser;
use flat21::{Bounds, ExtractOptions, GdsLibrary};
use std::error::Error;

// => The doc-comment on `ProgramOptions` here is displayed by the `clap`-generated help docs =>

/// GDSII Hierarchy Flattener
#[derive(Parser)]
struct ProgramOptions {
    /// GDS Input File
    #[clap(short = 'i', long)]
    gds: String,
    /// Cell to flatten. Defaults to the library's first top cell.
    #[clap(short = 'c', long)]
    cell: Option<String>,
    /// Flattened GDS Output File
    #[clap(short = 'o', long)]
    out: Option<String>,
    /// Clip window, in user units, as `x,y,dx,dy`
    #[clap(short = 'b', long)]
    bounds: Option<String>,
    /// Upper bound on emitted polygons
    #[clap(long, default_value_t = u64::MAX)]
    max_polys: u64,
    /// Shift output so the clip window's corner is the origin
    #[clap(long)]
    rebase: bool,
    /// List the library's top cells and exit
    #[clap(short, long)]
    tops: bool,
    /// List all of the library's cells and exit
    #[clap(short, long)]
    list: bool,
    /// Verbose Output Mode
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let options = ProgramOptions::parse();
    _main(&options)
}

fn _main(options: &ProgramOptions) -> Result<(), Box<dyn Error>> {
    let lib = GdsLibrary::open(&options.gds)?;

    if options.verbose {
        println!("read {}: {:?}", lib.path(), lib.stats());
    }
    if options.tops {
        println!("Top cells in: {}", lib.path());
        for cell in lib.top_cells() {
            println!("--> {}", cell.name);
        }
        return Ok(());
    }
    if options.list {
        println!("All cells in: {}", lib.path());
        for name in lib.all_cells() {
            println!("--> {}", name);
        }
        return Ok(());
    }

    let cell = match &options.cell {
        Some(c) => c.clone(),
        None => lib
            .top_cells()
            .first()
            .map(|c| c.name.clone())
            .ok_or("library defines no cells")?,
    };
    let bounds = match &options.bounds {
        Some(s) => Some(parse_bounds(s)?),
        None => None,
    };
    let opts = ExtractOptions {
        bounds,
        max_polys: options.max_polys,
        rebase: options.rebase,
    };

    let mut progress = |emitted: u64, scanned: u64| -> bool {
        println!("scanned {} polygons, emitted {}", scanned, emitted);
        false // carry on
    };
    let progress = if options.verbose {
        Some(&mut progress as &mut dyn FnMut(u64, u64) -> bool)
    } else {
        None
    };
    let polys = lib.extract_polygons(&cell, &opts, progress)?;

    if options.verbose {
        println!("flattened {} to {} polygons", cell, polys.len());
    }
    if let Some(out) = &options.out {
        lib.write_polys(out, &polys)?;
        if options.verbose {
            println!("wrote {}", out);
        }
    }
    Ok(())
}

/// Parse a `x,y,dx,dy` bounds argument
fn parse_bounds(s: &str) -> Result<Bounds, Box<dyn Error>> {
    let fields = s
        .split(',')
        .map(|f| f.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()?;
    if fields.len() != 4 {
        return Err("bounds take the form x,y,dx,dy".into());
    }
    Ok(Bounds::new(fields[0], fields[1], fields[2], fields[3]))
}
