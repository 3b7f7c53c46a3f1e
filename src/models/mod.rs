pub mod artifact;
pub mod loaders;
pub mod pillar;
pub mod question;
pub mod section;
pub mod verdict;

pub use artifact::{Artifact, ArtifactContent, IacTemplateType, ImageInput, SupportingDocument, UploadMode};
pub use loaders::{load_artifact, load_catalog_file, load_supporting_doc, load_workload_answers};
pub use pillar::Pillar;
pub use question::{slugify, BestPracticeRef, QuestionGroup};
pub use section::{join_sections, DocumentSection};
pub use verdict::{AnalysisEntry, AnalysisResult, ModelVerdict, Verdict};
