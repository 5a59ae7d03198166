//! Synthesizer
//!
//! For each stack: build the dependency graph, order the nodes, resolve
//! tokens and emit one document. Stacks are independent; a failure aborts
//! only the stack it occurs in.

use indexmap::IndexMap;
use rayon::prelude::*;
use tfsynth_construct::{App, Stack};
use tfsynth_graph::DependencyGraph;

use crate::config::SynthConfig;
use crate::emit::{emit, Document};
use crate::error::SynthError;

/// Successfully synthesized stack
#[derive(Debug, Clone, PartialEq)]
pub struct StackArtifact {
    name: String,
    document: Document,
    order: Vec<String>,
}

impl StackArtifact {
    /// Stack id
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emitted document
    #[inline]
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Node ids in emission order
    #[inline]
    #[must_use]
    pub fn order(&self) -> &[String] {
        &self.order
    }
}

/// Outcome of synthesizing an app, one entry per stack in app order
#[derive(Debug, Clone)]
pub struct Synthesis {
    stacks: IndexMap<String, Result<StackArtifact, SynthError>>,
}

impl Synthesis {
    /// Result for one stack
    #[must_use]
    pub fn get(&self, stack: &str) -> Option<&Result<StackArtifact, SynthError>> {
        self.stacks.get(stack)
    }

    /// Successful artifact for one stack
    #[must_use]
    pub fn artifact(&self, stack: &str) -> Option<&StackArtifact> {
        self.get(stack).and_then(|r| r.as_ref().ok())
    }

    /// Error for one stack
    #[must_use]
    pub fn error(&self, stack: &str) -> Option<&SynthError> {
        self.get(stack).and_then(|r| r.as_ref().err())
    }

    /// All results in app order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Result<StackArtifact, SynthError>)> {
        self.stacks.iter().map(|(id, r)| (id.as_str(), r))
    }

    /// Successful artifacts in app order
    pub fn artifacts(&self) -> impl Iterator<Item = &StackArtifact> {
        self.stacks.values().filter_map(|r| r.as_ref().ok())
    }

    /// Failures in app order
    pub fn errors(&self) -> impl Iterator<Item = &SynthError> {
        self.stacks.values().filter_map(|r| r.as_ref().err())
    }

    /// Number of stacks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    /// Whether the app had no stacks
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Whether every stack succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.stacks.values().all(Result::is_ok)
    }

    /// All artifacts, or the first failure in app order
    ///
    /// # Errors
    /// Returns the first stack's error if any stack failed
    pub fn into_result(self) -> Result<IndexMap<String, StackArtifact>, SynthError> {
        self.stacks
            .into_iter()
            .map(|(id, result)| result.map(|artifact| (id, artifact)))
            .collect()
    }
}

/// Turns construct trees into documents
#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    config: SynthConfig,
}

impl Synthesizer {
    /// Create a synthesizer
    #[inline]
    #[must_use]
    pub fn new(config: SynthConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Synthesize every stack of `app`
    ///
    /// With `parallel` set, stacks run on the rayon pool; results keep app
    /// order either way.
    #[must_use]
    pub fn synthesize(&self, app: &App) -> Synthesis {
        tracing::info!("Synthesizing {} stack(s)", app.stacks().len());

        let results: Vec<(String, Result<StackArtifact, SynthError>)> = if self.config.parallel {
            app.stacks()
                .par_iter()
                .map(|stack| (stack.id().to_string(), self.synthesize_stack(stack)))
                .collect()
        } else {
            app.stacks()
                .iter()
                .map(|stack| (stack.id().to_string(), self.synthesize_stack(stack)))
                .collect()
        };

        Synthesis {
            stacks: results.into_iter().collect(),
        }
    }

    /// Synthesize one stack
    ///
    /// # Errors
    /// - `Graph` if a reference is dangling or dependencies form a cycle
    /// - `SchemaViolation` if the final validation pass rejects a node
    pub fn synthesize_stack(&self, stack: &Stack) -> Result<StackArtifact, SynthError> {
        let result = self.run(stack);
        match &result {
            Ok(artifact) => tracing::info!(
                "Synthesized stack '{}' ({} nodes)",
                artifact.name,
                artifact.order.len()
            ),
            Err(e) => tracing::warn!("Stack '{}' failed: {}", stack.id(), e),
        }
        result
    }

    fn run(&self, stack: &Stack) -> Result<StackArtifact, SynthError> {
        let graph =
            DependencyGraph::build(stack).map_err(|e| SynthError::graph(stack.id(), e))?;
        let order = graph.topological_order();
        let ids: Vec<String> = order
            .iter()
            .map(|&i| stack.nodes()[i].id().to_string())
            .collect();
        tracing::debug!("Emission order for '{}': {:?}", stack.id(), ids);

        let document = emit(stack, &order, &self.config)?;
        Ok(StackArtifact {
            name: stack.id().to_string(),
            document,
            order: ids,
        })
    }
}

/// Synthesize with the default configuration
#[must_use]
pub fn synthesize(app: &App) -> Synthesis {
    Synthesizer::default().synthesize(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfsynth_construct::Attributes;
    use tfsynth_test_utils::{kms_app, null_resource, test_registry, KMS_STACK};
    use tfsynth_value::Value;

    #[test]
    fn test_kms_order() {
        let synthesis = synthesize(&kms_app());
        let artifact = synthesis.artifact(KMS_STACK).unwrap();
        assert_eq!(artifact.order(), ["aws", "aws_id", "aws_kms", "kms_alias"]);
    }

    #[test]
    fn test_failed_stack_does_not_affect_sibling() {
        let mut app = App::new(test_registry());
        let broken = app.add_stack("broken").unwrap();
        let a = null_resource(broken, "a", &[]);
        let b = null_resource(broken, "b", &[&a]);
        broken
            .set_attribute(&a, "triggers", Value::map([("b", b.id_ref())]))
            .unwrap();
        app.add_stack("fine")
            .unwrap()
            .resource("null_resource", "n", Attributes::new())
            .unwrap();

        let synthesis = synthesize(&app);
        assert!(!synthesis.is_success());
        assert!(synthesis.error("broken").unwrap().is_cycle());
        assert!(synthesis.artifact("fine").is_some());
        assert_eq!(synthesis.errors().count(), 1);

        let err = synthesis.into_result().unwrap_err();
        assert_eq!(err.stack(), "broken");
        assert_eq!(err.cycle(), Some(&["a".to_string(), "b".to_string(), "a".to_string()][..]));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut app = kms_app();
        for i in 0..4 {
            let stack = app.add_stack(&format!("extra{i}")).unwrap();
            let first = null_resource(stack, "first", &[]);
            null_resource(stack, "second", &[&first]);
        }

        let sequential = Synthesizer::new(SynthConfig::default()).synthesize(&app);
        let parallel =
            Synthesizer::new(SynthConfig::default().with_parallel(true)).synthesize(&app);

        let ids: Vec<_> = parallel.iter().map(|(id, _)| id).collect();
        assert_eq!(
            ids,
            vec![KMS_STACK, "extra0", "extra1", "extra2", "extra3"]
        );
        for (id, result) in sequential.iter() {
            assert_eq!(result, parallel.get(id).unwrap());
        }
    }
}
