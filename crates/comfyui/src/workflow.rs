//! Save-format workflow templates and their compiled, executable form.
//!
//! ComfyUI's editor saves a workflow as a graph of `nodes` (with declared
//! `inputs` and positional `widgets_values`) plus a `links` table. The
//! `/prompt` endpoint instead expects a [`JobDescription`]: a map of node
//! id to `{class_type, inputs}` where each input is a literal or a
//! `[source_node_id, output_slot]` reference.
//!
//! [`compile`] performs that conversion. Widget values are matched to
//! widget inputs purely by position: the n-th widget input of a node takes
//! the n-th unused entry of its `widgets_values`. Editor-only extras such
//! as a seed's `control_after_generate` value therefore shift every later
//! widget by one. The patch step overwrites all sampler parameters for
//! that reason; other positional drift is caught by the fixture tests
//! rather than corrected here.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use outfit_core::prompt::PromptPair;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Template (save format)
// ---------------------------------------------------------------------------

/// A workflow as saved by the ComfyUI editor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkflowTemplate {
    #[serde(default, deserialize_with = "de_null_as_empty")]
    pub nodes: Vec<TemplateNode>,
    /// `[link_id, source_node_id, source_slot, target_node_id, target_slot, type]`.
    #[serde(default, deserialize_with = "de_null_as_empty")]
    pub links: Vec<Value>,
}

/// A node in the saved graph.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateNode {
    #[serde(deserialize_with = "de_node_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub class_type: String,
    #[serde(default, deserialize_with = "de_null_as_empty")]
    pub inputs: Vec<TemplateInput>,
    #[serde(default)]
    pub widgets_values: Option<Value>,
}

/// A declared node input: wired to a link, backed by a widget, or neither.
///
/// An unnamed widget input still consumes its positional value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub link: Option<u64>,
    #[serde(default)]
    pub widget: Option<Value>,
}

fn de_null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn de_node_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    node_id_string(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("node id must be a number or string, got {value}")))
}

fn node_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl WorkflowTemplate {
    /// Read and parse a saved workflow file.
    pub fn load(path: &Path) -> Result<Self, WorkflowError> {
        let text = std::fs::read_to_string(path).map_err(|source| WorkflowError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, WorkflowError> {
        Ok(serde_json::from_str(text)?)
    }

    /// `link_id -> (source node id, source slot)` for every well-formed link.
    fn link_lookup(&self) -> HashMap<u64, NodeRef> {
        let mut lookup = HashMap::with_capacity(self.links.len());
        for link in &self.links {
            let parsed = link.as_array().and_then(|fields| {
                let id = fields.first()?.as_u64()?;
                let source = node_id_string(fields.get(1)?)?;
                let slot = fields.get(2)?.as_u64()?;
                Some((id, NodeRef(source, slot)))
            });
            match parsed {
                Some((id, source)) => {
                    lookup.insert(id, source);
                }
                None => tracing::warn!(link = %link, "Ignoring malformed workflow link"),
            }
        }
        lookup
    }
}

// ---------------------------------------------------------------------------
// Job description (API format)
// ---------------------------------------------------------------------------

/// Reference to output `slot` of node `.0`; serializes as `["5", 0]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRef(pub String, pub u64);

/// A compiled input value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InputValue {
    Link(NodeRef),
    Literal(Value),
}

impl From<Value> for InputValue {
    fn from(value: Value) -> Self {
        InputValue::Literal(value)
    }
}

/// One executable node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobNode {
    pub class_type: String,
    pub inputs: BTreeMap<String, InputValue>,
}

impl JobNode {
    pub fn input(&self, name: &str) -> Option<&InputValue> {
        self.inputs.get(name)
    }

    fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.inputs
            .insert(name.to_string(), InputValue::Literal(value.into()));
    }
}

/// The `prompt` payload submitted to `POST /prompt`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JobDescription {
    nodes: BTreeMap<String, JobNode>,
}

impl JobDescription {
    pub fn node(&self, id: &str) -> Option<&JobNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Inject prompt text, seed and sampler settings into the target nodes.
    ///
    /// Every target is checked before anything is written, so a missing
    /// node leaves the job untouched.
    pub fn patch(
        &mut self,
        targets: &PatchTargets,
        prompts: &PromptPair,
        seed: u32,
        sampler: &SamplerSettings,
    ) -> Result<(), WorkflowError> {
        for id in [
            &targets.positive_node,
            &targets.negative_node,
            &targets.sampler_node,
        ] {
            if !self.contains(id) {
                return Err(WorkflowError::NodeNotFound(id.clone()));
            }
        }

        self.target(&targets.positive_node)?
            .set("text", prompts.positive.as_str());
        self.target(&targets.negative_node)?
            .set("text", prompts.negative.as_str());

        let node = self.target(&targets.sampler_node)?;
        node.set("seed", seed);
        node.set("steps", sampler.steps);
        node.set("cfg", sampler.cfg);
        node.set("sampler_name", sampler.sampler_name.as_str());
        node.set("scheduler", sampler.scheduler.as_str());
        node.set("denoise", sampler.denoise);

        tracing::debug!(
            positive_node = %targets.positive_node,
            negative_node = %targets.negative_node,
            sampler_node = %targets.sampler_node,
            seed,
            "Patched job description",
        );
        Ok(())
    }

    fn target(&mut self, id: &str) -> Result<&mut JobNode, WorkflowError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| WorkflowError::NodeNotFound(id.to_string()))
    }
}

/// Node ids that receive the per-item parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchTargets {
    pub positive_node: String,
    pub negative_node: String,
    pub sampler_node: String,
}

impl Default for PatchTargets {
    fn default() -> Self {
        Self {
            positive_node: "6".to_string(),
            negative_node: "71".to_string(),
            sampler_node: "294".to_string(),
        }
    }
}

/// Fixed KSampler parameters applied to every job.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerSettings {
    pub steps: u32,
    pub cfg: f64,
    pub sampler_name: String,
    pub scheduler: String,
    pub denoise: f64,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            steps: 40,
            cfg: 5.5,
            sampler_name: "dpmpp_2m".to_string(),
            scheduler: "sgm_uniform".to_string(),
            denoise: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Convert a saved workflow into an executable job description.
///
/// For each declared input: a link present in the link table becomes a
/// [`NodeRef`]; otherwise a widget input takes the node's next unused
/// positional widget value; inputs with neither are left unset.
pub fn compile(template: &WorkflowTemplate) -> JobDescription {
    let links = template.link_lookup();
    let mut nodes = BTreeMap::new();

    for node in &template.nodes {
        let widget_values: &[Value] = node
            .widgets_values
            .as_ref()
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let mut next_widget = 0;
        let mut inputs = BTreeMap::new();

        for input in &node.inputs {
            let value = if let Some(source) = input.link.and_then(|id| links.get(&id)) {
                Some(InputValue::Link(source.clone()))
            } else if input.widget.as_ref().is_some_and(|w| !w.is_null()) {
                let value = widget_values.get(next_widget).cloned();
                if value.is_some() {
                    next_widget += 1;
                } else {
                    tracing::debug!(
                        node_id = %node.id,
                        input = ?input.name,
                        "No widget value left for input, leaving it unset",
                    );
                }
                value.map(InputValue::Literal)
            } else {
                None
            };

            match (value, &input.name) {
                (Some(value), Some(name)) => {
                    inputs.insert(name.clone(), value);
                }
                (Some(_), None) => {
                    tracing::warn!(node_id = %node.id, "Dropping value of unnamed input");
                }
                (None, _) => {}
            }
        }

        if nodes
            .insert(
                node.id.clone(),
                JobNode {
                    class_type: node.class_type.clone(),
                    inputs,
                },
            )
            .is_some()
        {
            tracing::warn!(node_id = %node.id, "Duplicate node id in workflow, keeping the last one");
        }
    }

    tracing::debug!(nodes = nodes.len(), links = links.len(), "Compiled workflow template");
    JobDescription { nodes }
}

/// Compile `template` and patch it for one item.
pub fn build_job(
    template: &WorkflowTemplate,
    targets: &PatchTargets,
    prompts: &PromptPair,
    seed: u32,
    sampler: &SamplerSettings,
) -> Result<JobDescription, WorkflowError> {
    let mut job = compile(template);
    job.patch(targets, prompts, seed, sampler)?;
    Ok(job)
}

/// Errors from loading or compiling a workflow template.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Failed to read workflow template {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid workflow template: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Node {0} not found in compiled workflow")]
    NodeNotFound(String),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn prompts() -> PromptPair {
        PromptPair {
            positive: "positive text".into(),
            negative: "negative text".into(),
        }
    }

    fn template(value: Value) -> WorkflowTemplate {
        serde_json::from_value(value).expect("template")
    }

    #[test]
    fn linked_input_becomes_node_reference() {
        let t = template(json!({
            "nodes": [
                { "id": 5, "type": "LoadImage", "inputs": [] },
                { "id": 7, "type": "SaveImage", "inputs": [{ "name": "image", "link": 1 }] }
            ],
            "links": [[1, "5", 0]]
        }));

        let job = compile(&t);
        let node = job.node("7").expect("node 7");
        assert_eq!(
            node.input("image"),
            Some(&InputValue::Link(NodeRef("5".into(), 0)))
        );
        let serialized = serde_json::to_value(&job).expect("serialize");
        assert_eq!(serialized["7"]["inputs"]["image"], json!(["5", 0]));
        assert_eq!(serialized["7"]["class_type"], "SaveImage");
    }

    #[test]
    fn widget_inputs_take_values_in_order() {
        let t = template(json!({
            "nodes": [{
                "id": 135,
                "type": "EmptyLatentImage",
                "inputs": [
                    { "name": "width", "widget": { "name": "width" }, "link": null },
                    { "name": "height", "widget": { "name": "height" }, "link": null },
                    { "name": "batch_size", "widget": { "name": "batch_size" }, "link": null }
                ],
                "widgets_values": [768, 1024, 1]
            }]
        }));

        let job = compile(&t);
        let node = job.node("135").expect("node");
        assert_eq!(node.input("width"), Some(&InputValue::Literal(json!(768))));
        assert_eq!(node.input("height"), Some(&InputValue::Literal(json!(1024))));
        assert_eq!(node.input("batch_size"), Some(&InputValue::Literal(json!(1))));
    }

    #[test]
    fn linked_widget_input_does_not_consume_a_value() {
        let t = template(json!({
            "nodes": [
                { "id": 1, "type": "PrimitiveNode", "inputs": [] },
                {
                    "id": 2,
                    "type": "EmptyLatentImage",
                    "inputs": [
                        { "name": "width", "widget": { "name": "width" }, "link": 10 },
                        { "name": "height", "widget": { "name": "height" } }
                    ],
                    "widgets_values": [512, 640]
                }
            ],
            "links": [[10, 1, 0, 2, 0, "INT"]]
        }));

        let job = compile(&t);
        let node = job.node("2").expect("node");
        assert_eq!(node.input("width"), Some(&InputValue::Link(NodeRef("1".into(), 0))));
        assert_eq!(node.input("height"), Some(&InputValue::Literal(json!(512))));
    }

    #[test]
    fn inputs_without_values_are_left_unset() {
        let t = template(json!({
            "nodes": [{
                "id": 3,
                "type": "KSampler",
                "inputs": [
                    { "name": "model", "link": 99 },
                    { "name": "seed", "widget": { "name": "seed" } },
                    { "name": "steps", "widget": { "name": "steps" } }
                ],
                "widgets_values": [42]
            }]
        }));

        let job = compile(&t);
        let node = job.node("3").expect("node");
        assert!(node.input("model").is_none(), "unknown link ids are not referenced");
        assert_eq!(node.input("seed"), Some(&InputValue::Literal(json!(42))));
        assert!(node.input("steps").is_none());
    }

    #[test]
    fn object_widgets_values_provide_no_positional_values() {
        let t = template(json!({
            "nodes": [{
                "id": 4,
                "type": "VHS_VideoCombine",
                "inputs": [{ "name": "frame_rate", "widget": { "name": "frame_rate" } }],
                "widgets_values": { "frame_rate": 8 }
            }]
        }));

        let job = compile(&t);
        assert!(job.node("4").expect("node").inputs.is_empty());
    }

    #[test]
    fn node_without_inputs_compiles_to_empty_input_map() {
        let t = template(json!({ "nodes": [{ "id": "9", "type": "Note", "widgets_values": ["hi"] }] }));
        let job = compile(&t);
        let node = job.node("9").expect("node");
        assert_eq!(node.class_type, "Note");
        assert!(node.inputs.is_empty());
    }

    #[test]
    fn null_collections_are_treated_as_empty() {
        let t = template(json!({
            "nodes": [
                { "id": 1, "type": "Note", "inputs": null, "widgets_values": null },
                { "id": 2, "type": "SaveImage", "inputs": [{ "name": "images", "link": 3 }] }
            ],
            "links": null
        }));

        let job = compile(&t);
        assert!(job.node("1").expect("node").inputs.is_empty());
        assert!(job.node("2").expect("node").inputs.is_empty());
        assert!(compile(&template(json!({ "nodes": null }))).is_empty());
    }

    #[test]
    fn unnamed_widget_input_still_consumes_its_value() {
        let t = template(json!({
            "nodes": [{
                "id": 5,
                "type": "EmptyLatentImage",
                "inputs": [
                    { "widget": { "name": "width" } },
                    { "name": "height", "widget": { "name": "height" } }
                ],
                "widgets_values": [512, 768]
            }]
        }));

        let job = compile(&t);
        let node = job.node("5").expect("node");
        assert_eq!(node.inputs.len(), 1);
        assert_eq!(node.input("height"), Some(&InputValue::Literal(json!(768))));
    }

    #[test]
    fn malformed_links_are_ignored() {
        let t = template(json!({
            "nodes": [{ "id": 1, "type": "SaveImage", "inputs": [{ "name": "images", "link": 2 }] }],
            "links": [[2], "junk", [3, 1, 0]]
        }));
        let job = compile(&t);
        assert!(job.node("1").expect("node").input("images").is_none());
    }

    #[test]
    fn patch_sets_prompts_seed_and_sampler() {
        let t = template(json!({
            "nodes": [
                { "id": 6, "type": "CLIPTextEncode" },
                { "id": 71, "type": "CLIPTextEncode" },
                { "id": 294, "type": "KSampler" }
            ]
        }));

        let job = build_job(
            &t,
            &PatchTargets::default(),
            &prompts(),
            123,
            &SamplerSettings::default(),
        )
        .expect("job");

        let value = serde_json::to_value(&job).expect("serialize");
        assert_eq!(value["6"]["inputs"]["text"], "positive text");
        assert_eq!(value["71"]["inputs"]["text"], "negative text");
        let sampler = &value["294"]["inputs"];
        assert_eq!(sampler["seed"], 123);
        assert_eq!(sampler["steps"], 40);
        assert_eq!(sampler["cfg"], 5.5);
        assert_eq!(sampler["sampler_name"], "dpmpp_2m");
        assert_eq!(sampler["scheduler"], "sgm_uniform");
        assert_eq!(sampler["denoise"], 1.0);
    }

    #[test]
    fn missing_target_fails_without_mutation() {
        let t = template(json!({
            "nodes": [
                { "id": 6, "type": "CLIPTextEncode" },
                { "id": 294, "type": "KSampler" }
            ]
        }));
        let snapshot = t.clone();

        let mut job = compile(&t);
        let before = job.clone();
        let result = job.patch(
            &PatchTargets::default(),
            &prompts(),
            1,
            &SamplerSettings::default(),
        );

        assert_matches!(result, Err(WorkflowError::NodeNotFound(id)) if id == "71");
        assert_eq!(job, before);
        assert_eq!(t, snapshot);
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        assert_matches!(WorkflowTemplate::from_json("{ nodes: "), Err(WorkflowError::Parse(_)));
        assert_matches!(
            WorkflowTemplate::from_json(r#"{"nodes": [{"id": [1], "type": "X"}]}"#),
            Err(WorkflowError::Parse(_))
        );
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let result = WorkflowTemplate::load(&dir.path().join("missing.json"));
        assert_matches!(result, Err(WorkflowError::Load { .. }));
    }
}
