use clap::Parser;

use crate::config::defs::{
    BEDTOOLS_TAG, BEROKKA_TAG, BWA_TAG, CIRCLATOR_TAG, DEFAULT_MEDAKA_MODEL, DEFAULT_MIN_CONTIG_LENGTH,
    DEFAULT_READ_LENGTH, DEFAULT_SAMPLE_NAME, FIX_REPEATS_TAG, FLYE_TAG, MEDAKA_TAG, MINIMAP2_TAG, RACON_TAG,
    SAMTOOLS_TAG,
};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "hybrid-assembly-pipelines", version, about = "ONT plus Illumina consensus assembler")]
pub struct Arguments {

    #[arg(short = 'p', long = "pe_reads", help = "Interleaved paired-end short reads")]
    pub pe_reads: String,

    #[arg(short = 'l', long = "long_reads", help = "Path to the ONT long reads")]
    pub long_reads: String,

    #[arg(short = 'o', long = "outdir", help = "Output directory; must not exist yet")]
    pub outdir: String,

    #[arg(short = 'd', long = "dnaA_file", help = "Start-site genes; defaults to db/uniprot_dnaA.nucleotides.fa, which must be installed in the binary's parent or own directory")]
    pub dnaa_file: Option<String>,

    #[arg(short = 's', long = "sample_name", default_value = DEFAULT_SAMPLE_NAME, help = "Prefix for output files")]
    pub sample_name: String,

    #[arg(long = "mp", action, help = "Add Flye's --plasmids and --meta options")]
    pub mp: bool,

    #[arg(short = 'x', long = "existing_contigs", action, requires = "contigs",
          help = "Skip assembly and start from existing contigs")]
    pub existing_contigs: bool,

    #[arg(short = 'c', long = "contigs", help = "Existing contigs FASTA, used with --existing_contigs")]
    pub contigs: Option<String>,

    #[arg(short = 't', long, default_value_t = 1)]
    pub threads: usize,

    #[arg(long = "medaka_model", default_value = DEFAULT_MEDAKA_MODEL, help = "Basecaller model passed to medaka -m")]
    pub medaka_model: String,

    #[arg(long = "min_contig_length", default_value_t = DEFAULT_MIN_CONTIG_LENGTH)]
    pub min_contig_length: usize,

    #[arg(long = "read_length", default_value_t = DEFAULT_READ_LENGTH, help = "Short-read length for repeat correction")]
    pub read_length: usize,

    #[arg(long = "tool_timeout_secs", help = "Kill any external tool running longer than this; no limit by default")]
    pub tool_timeout_secs: Option<u64>,

    #[arg(long = "dry_run", action, help = "Print the resolved plan and commands without running anything")]
    pub dry_run: bool,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(long = "flye_path", default_value = FLYE_TAG)]
    pub flye_path: String,

    #[arg(long = "berokka_path", default_value = BEROKKA_TAG)]
    pub berokka_path: String,

    #[arg(long = "circlator_path", default_value = CIRCLATOR_TAG)]
    pub circlator_path: String,

    #[arg(long = "minimap2_path", default_value = MINIMAP2_TAG)]
    pub minimap2_path: String,

    #[arg(long = "bwa_path", default_value = BWA_TAG)]
    pub bwa_path: String,

    #[arg(long = "racon_path", default_value = RACON_TAG)]
    pub racon_path: String,

    #[arg(long = "medaka_path", default_value = MEDAKA_TAG)]
    pub medaka_path: String,

    #[arg(long = "samtools_path", default_value = SAMTOOLS_TAG)]
    pub samtools_path: String,

    #[arg(long = "bedtools_path", default_value = BEDTOOLS_TAG)]
    pub bedtools_path: String,

    #[arg(long = "fix_repeats_path", default_value = FIX_REPEATS_TAG)]
    pub fix_repeats_path: String,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_flags() {
        let parsed = Arguments::try_parse_from(["hybrid-assembly-pipelines", "-l", "ont.fq", "-o", "out"]);
        assert!(parsed.is_err(), "missing --pe_reads should be rejected");
    }

    #[test]
    fn test_existing_contigs_requires_contigs() {
        let parsed = Arguments::try_parse_from([
            "hybrid-assembly-pipelines", "-p", "pe.fq", "-l", "ont.fq", "-o", "out", "-x",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_tool_overrides() {
        let parsed = Arguments::try_parse_from([
            "hybrid-assembly-pipelines", "-p", "pe.fq", "-l", "ont.fq", "-o", "out",
            "--racon_path", "/opt/racon/bin/racon", "--tool_timeout_secs", "3600", "-t", "16",
        ])
        .unwrap();
        assert_eq!(parsed.racon_path, "/opt/racon/bin/racon");
        assert_eq!(parsed.flye_path, FLYE_TAG);
        assert_eq!(parsed.medaka_path, MEDAKA_TAG);
        assert_eq!(parsed.tool_timeout_secs, Some(3600));
        assert_eq!(parsed.threads, 16);
    }
}
