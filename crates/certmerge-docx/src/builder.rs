//! Builder strategies.
//!
//! A builder turns (template, replacement map) into a finished document at
//! an output path. The primary strategy is the pure-Rust engine; on
//! machines with a native document host installed a fallback strategy can
//! drive it directly. Strategies are probed by availability at runtime,
//! never chosen by static configuration, and the fallback only runs when
//! the primary reports zero replacements.

use std::path::Path;

use certmerge_core::{CertMergeError, Journal, ReplacementMap, Result};

use crate::engine;
use crate::host::HostBuilder;
use crate::package::DocxPackage;

/// A successful build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Regions rewritten (one event per touched region).
    pub regions_replaced: usize,
    /// Which strategy produced the document.
    pub engine: &'static str,
}

/// One way of building a certificate document.
pub trait CertificateBuilder {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    /// Whether this strategy can run on this machine.
    fn is_available(&self) -> bool {
        true
    }

    /// Build `output` from `template` with the given map.
    fn attempt(
        &self,
        template: &Path,
        map: &ReplacementMap,
        output: &Path,
        journal: &Journal,
    ) -> Result<BuildOutcome>;
}

/// Primary strategy: the in-process substitution engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineBuilder;

impl CertificateBuilder for EngineBuilder {
    fn name(&self) -> &'static str {
        "engine"
    }

    fn attempt(
        &self,
        template: &Path,
        map: &ReplacementMap,
        output: &Path,
        journal: &Journal,
    ) -> Result<BuildOutcome> {
        let mut package = DocxPackage::open(template)?;
        let outcome = engine::substitute(&mut package, map, journal)?;
        if outcome.regions_replaced == 0 {
            return Err(CertMergeError::NoReplacements);
        }
        package.save(output)?;
        Ok(BuildOutcome {
            regions_replaced: outcome.regions_replaced,
            engine: self.name(),
        })
    }
}

/// The default strategy list: engine first, host fallback when installed.
#[must_use]
pub fn default_builders(host_interactive: bool) -> Vec<Box<dyn CertificateBuilder>> {
    vec![
        Box::new(EngineBuilder),
        Box::new(HostBuilder::probe().interactive(host_interactive)),
    ]
}

/// Run the strategies in order. Only a zero-replacement outcome cascades
/// to the next strategy; any other failure belongs to the recipient.
pub fn build_certificate(
    builders: &[Box<dyn CertificateBuilder>],
    template: &Path,
    map: &ReplacementMap,
    output: &Path,
    journal: &Journal,
) -> Result<BuildOutcome> {
    for builder in builders {
        if !builder.is_available() {
            journal.debug(format!("builder {:?} unavailable, skipping", builder.name()));
            continue;
        }
        match builder.attempt(template, map, output, journal) {
            Ok(outcome) => {
                journal.info(format!(
                    "built {} via {} ({} regions)",
                    output.display(),
                    outcome.engine,
                    outcome.regions_replaced
                ));
                return Ok(outcome);
            }
            Err(CertMergeError::NoReplacements) => {
                journal.warn(format!(
                    "builder {:?} replaced nothing, trying next strategy",
                    builder.name()
                ));
            }
            Err(other) => return Err(other),
        }
    }
    Err(CertMergeError::NoReplacements)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBuilder {
        available: bool,
        outcome: std::result::Result<usize, &'static str>,
    }

    impl CertificateBuilder for FixedBuilder {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn attempt(
            &self,
            _template: &Path,
            _map: &ReplacementMap,
            _output: &Path,
            _journal: &Journal,
        ) -> Result<BuildOutcome> {
            match self.outcome {
                Ok(regions) if regions == 0 => Err(CertMergeError::NoReplacements),
                Ok(regions) => Ok(BuildOutcome {
                    regions_replaced: regions,
                    engine: "fixed",
                }),
                Err(message) => Err(CertMergeError::Build(message.to_string())),
            }
        }
    }

    fn run(builders: Vec<Box<dyn CertificateBuilder>>) -> Result<BuildOutcome> {
        build_certificate(
            &builders,
            Path::new("in.docx"),
            &ReplacementMap::new(),
            Path::new("out.docx"),
            &Journal::disabled(),
        )
    }

    #[test]
    fn test_zero_replacements_cascades_to_next_builder() {
        let outcome = run(vec![
            Box::new(FixedBuilder {
                available: true,
                outcome: Ok(0),
            }),
            Box::new(FixedBuilder {
                available: true,
                outcome: Ok(3),
            }),
        ])
        .expect("second builder succeeds");
        assert_eq!(outcome.regions_replaced, 3);
    }

    #[test]
    fn test_hard_failure_does_not_cascade() {
        let result = run(vec![
            Box::new(FixedBuilder {
                available: true,
                outcome: Err("disk full"),
            }),
            Box::new(FixedBuilder {
                available: true,
                outcome: Ok(3),
            }),
        ]);
        assert!(matches!(result, Err(CertMergeError::Build(_))));
    }

    #[test]
    fn test_unavailable_builders_are_skipped() {
        let result = run(vec![
            Box::new(FixedBuilder {
                available: false,
                outcome: Ok(5),
            }),
            Box::new(FixedBuilder {
                available: true,
                outcome: Ok(0),
            }),
        ]);
        assert!(matches!(result, Err(CertMergeError::NoReplacements)));
    }
}
