//! iGEMM Codegen Driver
//! 
//! Command-line front end for the LDS code generator. Each subcommand runs
//! one generation pass and prints the resulting assembly, followed by its
//! instruction issue cost.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use igc_codegen::{
    AccessBatch, AsmMacro, BuildContext, PairedRead, PairedWrite, RowSwap, StoreTemplate,
    StoreTemplateConfig, Sym, SwapPlan,
};
use igc_common::{Precision, SourceOrder};
use log::info;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "igc")]
#[command(about = "iGEMM LDS code generator")]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output assembly file (defaults to stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Batched LDS load, paired where possible
    Read {
        /// Number of elements
        #[arg(long)]
        count: u32,

        /// Bytes per element
        #[arg(long)]
        bytes: u32,

        /// Bytes between successive elements
        #[arg(long)]
        stride: u32,

        /// Byte offset of the first element
        #[arg(long, default_value_t = 0)]
        base: u32,

        /// Destination register base
        #[arg(long, default_value = "v_dst")]
        dst: String,

        /// LDS address register
        #[arg(long, default_value = "v_sld_os")]
        addr: String,
    },

    /// Batched LDS store, paired where possible
    Write {
        /// Number of elements
        #[arg(long)]
        count: u32,

        /// Bytes per element
        #[arg(long)]
        bytes: u32,

        /// Bytes between successive elements
        #[arg(long)]
        stride: u32,

        /// Byte offset of the first element
        #[arg(long, default_value_t = 0)]
        base: u32,

        /// Source register base
        #[arg(long, default_value = "v_src")]
        src: String,

        /// LDS address register
        #[arg(long, default_value = "v_sst_os")]
        addr: String,
    },

    /// In-register transpose swap plan
    Swap {
        #[arg(long)]
        rows: usize,

        #[arg(long)]
        cols: usize,

        /// Tile register base
        #[arg(long, default_value = "v_src")]
        src: String,
    },

    /// 2D LDS store template
    Sst {
        /// JSON file with the template configuration, overrides the flags below
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = 1)]
        d0: u32,

        #[arg(long, default_value_t = 1)]
        d1: u32,

        /// Elements per vector store
        #[arg(long, default_value_t = 1)]
        vector: u32,

        /// Bytes between successive vector stores
        #[arg(long, default_value_t = 0)]
        stride: u32,

        /// fp32, fp16 or bf16
        #[arg(long, default_value = "fp32")]
        precision: Precision,

        /// Source order tag (0 or 1)
        #[arg(long, default_value_t = 0)]
        order: u8,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let asm = generate(cli.command)?;

    if let Some(path) = cli.output {
        fs::write(&path, &asm).with_context(|| format!("writing {}", path.display()))?;
        info!("Assembly written to: {}", path.display());
    } else {
        print!("{}", asm);
    }
    Ok(())
}

/// Run one generation pass; nothing is returned unless the whole pass succeeds
fn generate(command: Commands) -> Result<String> {
    info!("Generating: {:?}", command);
    let mut ctx = BuildContext::new();

    let issues = match command {
        Commands::Read { count, bytes, stride, base, dst, addr } => {
            let read = PairedRead::new(AccessBatch::new(count, bytes, stride).with_base(base));
            let lines = read.select(ctx.emitter_mut(), &Sym::new(dst), &Sym::new(addr))?;
            ctx.emit_all(lines);
            read.issues()
        }
        Commands::Write { count, bytes, stride, base, src, addr } => {
            let write = PairedWrite::new(AccessBatch::new(count, bytes, stride).with_base(base));
            let lines = write.select(ctx.emitter_mut(), &Sym::new(addr), &Sym::new(src))?;
            ctx.emit_all(lines);
            write.issues()
        }
        Commands::Swap { rows, cols, src } => {
            let plan = SwapPlan::new(rows, cols)?;
            let src = Sym::new(src);
            for (r, entry) in plan.entries().iter().enumerate() {
                let comment = match entry {
                    RowSwap::Unified { bucket } => format!("; row {}: already row {}", r, bucket),
                    RowSwap::Swaps(pairs) => format!("; row {}: {} swaps", r, pairs.len()),
                };
                ctx.emitter_mut().emit(comment);
                ctx.emit_all(plan.swap_instructions(r, &src)?);
            }
            u32::try_from(plan.swap_count())?
        }
        Commands::Sst { config, d0, d1, vector, stride, precision, order } => {
            let config = match config {
                Some(path) => {
                    let text = fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    parse_config(&text)?
                }
                None => StoreTemplateConfig {
                    length_d0: d0,
                    length_d1: d1,
                    vector_d1: vector,
                    stride_d0: stride,
                    precision,
                    src_order: SourceOrder::try_from(order).map_err(anyhow::Error::msg)?,
                },
            };
            let template = StoreTemplate::new(config)?;
            ctx.define(&template)?;
            let call = template.call("v_src", "v_sst_os");
            ctx.emitter_mut().emit(call);
            template.issues()
        }
    };

    ctx.emitter_mut().emit(format!("; issues: {}", issues));
    Ok(ctx.finish())
}

fn parse_config(text: &str) -> Result<StoreTemplateConfig> {
    serde_json::from_str(text).context("invalid store template configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use igc_common::CodegenError;

    #[test]
    fn test_read_command() {
        let asm = generate(Commands::Read {
            count: 4,
            bytes: 4,
            stride: 4,
            base: 0,
            dst: "v_dst".to_string(),
            addr: "v_sld_os".to_string(),
        })
        .unwrap();
        assert_eq!(
            asm,
            "ds_read2_b32 v[v_dst+0:v_dst+1], v[v_sld_os], offset0:0, offset1:1\n\
             ds_read2_b32 v[v_dst+2:v_dst+3], v[v_sld_os], offset0:2, offset1:3\n\
             ; issues: 2\n"
        );
    }

    #[test]
    fn test_write_command_fails_whole_pass() {
        let result = generate(Commands::Write {
            count: 2,
            bytes: 6,
            stride: 6,
            base: 0,
            src: "v_src".to_string(),
            addr: "v_sst_os".to_string(),
        });
        let err = result.unwrap_err();
        assert_eq!(err.downcast_ref::<CodegenError>(), Some(&CodegenError::UnsupportedWidth(6)));
    }

    #[test]
    fn test_swap_command() {
        let asm = generate(Commands::Swap { rows: 2, cols: 2, src: "v_c".to_string() }).unwrap();
        assert_eq!(
            asm,
            "; row 0: 1 swaps\nv_swap_b32 v[v_c+2], v[v_c+1]\n; row 1: already row 1\n; issues: 1\n"
        );
        assert!(generate(Commands::Swap { rows: 1, cols: 4, src: "v_c".to_string() }).is_err());
    }

    #[test]
    fn test_sst_command() {
        let asm = generate(Commands::Sst {
            config: None,
            d0: 1,
            d1: 2,
            vector: 2,
            stride: 0,
            precision: Precision::Fp32,
            order: 0,
        })
        .unwrap();
        assert!(asm.starts_with(".macro .v_sst_so0_1x2_b32_v2 v_src, v_sst_os\n"));
        assert!(asm.contains("    ds_write_b64 v[\\v_sst_os], v[\\v_src+0:\\v_src+0+1]\n"));
        assert!(asm.ends_with(".v_sst_so0_1x2_b32_v2 v_src, v_sst_os\n; issues: 1\n"));

        let bad_order = generate(Commands::Sst {
            config: None,
            d0: 1,
            d1: 2,
            vector: 2,
            stride: 0,
            precision: Precision::Fp32,
            order: 7,
        });
        assert!(bad_order.is_err());
    }

    #[test]
    fn test_parse_config() {
        let config = parse_config(r#"{ "length_d0": 4, "length_d1": 2, "vector_d1": 2, "stride_d0": 64, "src_order": 1 }"#).unwrap();
        assert_eq!(config.src_order, SourceOrder::D1D0);
        assert_eq!(config.precision, Precision::Fp32);
        assert!(parse_config("{ \"length_d0\": \"four\" }").is_err());
    }
}
