// Canonical locations of every file and directory the pipeline writes.

use std::fmt;
use std::path::PathBuf;

use crate::config::defs::{
    PipelineError, ASSEMBLY_DIR, BEROKKA_TRIMMED_FASTA, CONSENSUS_DIR, COVERAGE_PROFILE, FASTA_EXT,
    FLYE_DEFAULT_FASTA, LONG_READ_DIR, MEDAKA_CONSENSUS_FASTA, REPEAT_SCRATCH_DIR, SHORT_READ_DIR, TRIM_DIR,
};


/// Polishing round. Rounds 1 and 2 polish with long reads, 3 and 4 with short reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Round(u8);

impl Round {
    pub const LONG_READ: [Round; 2] = [Round(1), Round(2)];
    pub const SHORT_READ: [Round; 2] = [Round(3), Round(4)];

    pub fn new(n: u8) -> Result<Self, PipelineError> {
        if (1..=4).contains(&n) {
            Ok(Round(n))
        } else {
            Err(PipelineError::InvalidRound(n))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn family(self) -> ReadFamily {
        if self.0 <= 2 {
            ReadFamily::Long
        } else {
            ReadFamily::Short
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadFamily {
    Long,
    Short,
}

/// The two start-site rotations: after the first long-read polish and after
/// the first short-read polish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartSiteOccurrence {
    First,
    Second,
}

impl fmt::Display for StartSiteOccurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartSiteOccurrence::First => write!(f, "first"),
            StartSiteOccurrence::Second => write!(f, "second"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    AssemblyDir,
    AssemblerDefaultFasta,
    AssemblyFasta,
    TrimDir,
    TrimmedFasta,
    CleanPrefix,
    CleanedFasta,
    LongReadDir,
    ShortReadDir,
    Alignment(Round),
    Polished(Round),
    StartSitePrefix(StartSiteOccurrence),
    StartSiteFasta(StartSiteOccurrence),
    ConsensusDir,
    ConsensusFasta,
    CoverageBam,
    CoverageProfile,
    RepeatScratchDir,
    FinalFasta,
}

impl Artifact {
    /// Artifacts deleted once the stage that consumes them succeeds.
    pub fn is_transient(self) -> bool {
        matches!(self, Artifact::Alignment(_) | Artifact::RepeatScratchDir)
    }
}


/// Maps artifacts to paths under one output root for one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNamer {
    out_dir: PathBuf,
    sample: String,
}

impl ArtifactNamer {
    pub fn new(out_dir: impl Into<PathBuf>, sample: impl Into<String>) -> Self {
        ArtifactNamer {
            out_dir: out_dir.into(),
            sample: sample.into(),
        }
    }

    pub fn path(&self, artifact: Artifact) -> PathBuf {
        let s = &self.sample;
        match artifact {
            Artifact::AssemblyDir => self.out_dir.join(ASSEMBLY_DIR),
            Artifact::AssemblerDefaultFasta => self.path(Artifact::AssemblyDir).join(FLYE_DEFAULT_FASTA),
            Artifact::AssemblyFasta => self.path(Artifact::AssemblyDir).join(format!("{}_assembly.{}", s, FASTA_EXT)),
            Artifact::TrimDir => self.out_dir.join(TRIM_DIR),
            Artifact::TrimmedFasta => self.path(Artifact::TrimDir).join(BEROKKA_TRIMMED_FASTA),
            Artifact::CleanPrefix => self.path(Artifact::TrimDir).join(format!("{}_clean", s)),
            Artifact::CleanedFasta => with_fasta_ext(self.path(Artifact::CleanPrefix)),
            Artifact::LongReadDir => self.out_dir.join(LONG_READ_DIR),
            Artifact::ShortReadDir => self.out_dir.join(SHORT_READ_DIR),
            Artifact::Alignment(round) => self.family_dir(round.family()).join(format!("align_{}.sam", round)),
            Artifact::Polished(round) => {
                self.family_dir(round.family()).join(format!("{}_racon{}.{}", s, round, FASTA_EXT))
            }
            Artifact::StartSitePrefix(StartSiteOccurrence::First) => {
                self.family_dir(ReadFamily::Long).join(format!("{}_circlator", s))
            }
            Artifact::StartSitePrefix(StartSiteOccurrence::Second) => {
                self.family_dir(ReadFamily::Short).join(format!("{}_circlator2", s))
            }
            Artifact::StartSiteFasta(occurrence) => with_fasta_ext(self.path(Artifact::StartSitePrefix(occurrence))),
            Artifact::ConsensusDir => self.out_dir.join(CONSENSUS_DIR),
            Artifact::ConsensusFasta => self.path(Artifact::ConsensusDir).join(MEDAKA_CONSENSUS_FASTA),
            Artifact::CoverageBam => self.family_dir(ReadFamily::Short).join(format!("{}_racon4_sort.bam", s)),
            Artifact::CoverageProfile => self.family_dir(ReadFamily::Short).join(COVERAGE_PROFILE),
            Artifact::RepeatScratchDir => self.family_dir(ReadFamily::Short).join(REPEAT_SCRATCH_DIR),
            Artifact::FinalFasta => self.family_dir(ReadFamily::Short).join(format!("{}_final.{}", s, FASTA_EXT)),
        }
    }

    fn family_dir(&self, family: ReadFamily) -> PathBuf {
        match family {
            ReadFamily::Long => self.path(Artifact::LongReadDir),
            ReadFamily::Short => self.path(Artifact::ShortReadDir),
        }
    }
}

// Prefix-style tools (circlator) append ".fasta" to whatever they are given,
// so the sample name may itself contain dots.
fn with_fasta_ext(prefix: PathBuf) -> PathBuf {
    let mut name = prefix.into_os_string();
    name.push(".");
    name.push(FASTA_EXT);
    PathBuf::from(name)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn every_artifact() -> Vec<Artifact> {
        let mut all = vec![
            Artifact::AssemblyDir,
            Artifact::AssemblerDefaultFasta,
            Artifact::AssemblyFasta,
            Artifact::TrimDir,
            Artifact::TrimmedFasta,
            Artifact::CleanPrefix,
            Artifact::CleanedFasta,
            Artifact::LongReadDir,
            Artifact::ShortReadDir,
            Artifact::StartSitePrefix(StartSiteOccurrence::First),
            Artifact::StartSitePrefix(StartSiteOccurrence::Second),
            Artifact::StartSiteFasta(StartSiteOccurrence::First),
            Artifact::StartSiteFasta(StartSiteOccurrence::Second),
            Artifact::ConsensusDir,
            Artifact::ConsensusFasta,
            Artifact::CoverageBam,
            Artifact::CoverageProfile,
            Artifact::RepeatScratchDir,
            Artifact::FinalFasta,
        ];
        for n in 1..=4 {
            let round = Round::new(n).unwrap();
            all.push(Artifact::Alignment(round));
            all.push(Artifact::Polished(round));
        }
        all
    }

    #[test]
    fn test_round_bounds() {
        assert!(matches!(Round::new(0), Err(PipelineError::InvalidRound(0))));
        assert!(matches!(Round::new(5), Err(PipelineError::InvalidRound(5))));
        assert_eq!(Round::new(3).unwrap().get(), 3);
        assert_eq!(Round::LONG_READ.map(|r| r.get()), [1, 2]);
        assert_eq!(Round::SHORT_READ.map(|r| r.get()), [3, 4]);
        assert!(Round::LONG_READ.iter().all(|r| r.family() == ReadFamily::Long));
        assert!(Round::SHORT_READ.iter().all(|r| r.family() == ReadFamily::Short));
    }

    #[test]
    fn test_known_paths() {
        let namer = ArtifactNamer::new("/runs/out", "ecoli");
        assert_eq!(namer.path(Artifact::AssemblyFasta), PathBuf::from("/runs/out/flye_assembly/ecoli_assembly.fasta"));
        assert_eq!(namer.path(Artifact::TrimmedFasta), PathBuf::from("/runs/out/berokka_results/02.trimmed.fa"));
        assert_eq!(namer.path(Artifact::CleanedFasta), PathBuf::from("/runs/out/berokka_results/ecoli_clean.fasta"));
        assert_eq!(
            namer.path(Artifact::Alignment(Round::new(1).unwrap())),
            PathBuf::from("/runs/out/longRead_polish_results/align_1.sam")
        );
        assert_eq!(
            namer.path(Artifact::Polished(Round::new(3).unwrap())),
            PathBuf::from("/runs/out/shortRead_polish_results/ecoli_racon3.fasta")
        );
        assert_eq!(
            namer.path(Artifact::StartSiteFasta(StartSiteOccurrence::Second)),
            PathBuf::from("/runs/out/shortRead_polish_results/ecoli_circlator2.fasta")
        );
        assert_eq!(namer.path(Artifact::ConsensusFasta), PathBuf::from("/runs/out/medaka_results/consensus.fasta"));
        assert_eq!(namer.path(Artifact::FinalFasta), PathBuf::from("/runs/out/shortRead_polish_results/ecoli_final.fasta"));
    }

    #[test]
    fn test_naming_is_deterministic() {
        let a = ArtifactNamer::new("out", "SAMPLE");
        let b = ArtifactNamer::new("out", "SAMPLE");
        for artifact in every_artifact() {
            assert_eq!(a.path(artifact), b.path(artifact));
            assert_eq!(a.path(artifact), a.path(artifact));
        }
    }

    #[test]
    fn test_naming_is_collision_free() {
        for sample in ["SAMPLE", "align", "consensus", "x.y"] {
            let namer = ArtifactNamer::new("/o", sample);
            let artifacts = every_artifact();
            let paths: HashSet<PathBuf> = artifacts.iter().map(|a| namer.path(*a)).collect();
            assert_eq!(paths.len(), artifacts.len(), "collision for sample {}", sample);
            assert!(paths.iter().all(|p| p.starts_with("/o")));
        }
    }

    #[test]
    fn test_dotted_sample_keeps_full_prefix() {
        let namer = ArtifactNamer::new("/o", "strain.v2");
        assert_eq!(namer.path(Artifact::CleanedFasta), PathBuf::from("/o/berokka_results/strain.v2_clean.fasta"));
    }

    #[test]
    fn test_transient_artifacts() {
        assert!(Artifact::Alignment(Round::new(2).unwrap()).is_transient());
        assert!(Artifact::RepeatScratchDir.is_transient());
        assert!(!Artifact::Polished(Round::new(2).unwrap()).is_transient());
        assert!(!Artifact::FinalFasta.is_transient());
    }
}
