//! Modelos de dominio: documentos de entrada, análisis por tema y resultados.
//!
//! Todo se crea por petición y se descarta al terminarla; nada se persiste.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use serde::Serialize;

/// Documento subido por el usuario. Su contenido se libera al terminar la
/// extracción de texto.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub content: Bytes,
}

impl Document {
    pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Los nueve temas fijos de la extracción por secciones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Topic {
    InformacionGeneral,
    DatosGenerales,
    MateriaAsegurada,
    Coberturas,
    LimitesYSublimites,
    DeduciblesYFranquicias,
    Exclusiones,
    Condiciones,
    AnexosYEndosos,
}

impl Topic {
    pub const ALL: [Topic; 9] = [
        Topic::InformacionGeneral,
        Topic::DatosGenerales,
        Topic::MateriaAsegurada,
        Topic::Coberturas,
        Topic::LimitesYSublimites,
        Topic::DeduciblesYFranquicias,
        Topic::Exclusiones,
        Topic::Condiciones,
        Topic::AnexosYEndosos,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Topic::InformacionGeneral => "informacionGeneral",
            Topic::DatosGenerales => "datosGenerales",
            Topic::MateriaAsegurada => "materiaAsegurada",
            Topic::Coberturas => "coberturas",
            Topic::LimitesYSublimites => "limitesYSublimites",
            Topic::DeduciblesYFranquicias => "deduciblesYFranquicias",
            Topic::Exclusiones => "exclusiones",
            Topic::Condiciones => "condiciones",
            Topic::AnexosYEndosos => "anexosYEndosos",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Los cuatro grupos de la búsqueda complementaria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GapTopic {
    DatosFaltantes,
    CoberturasYLimites,
    ExclusionesYCondiciones,
    AnexosYOtros,
}

impl GapTopic {
    pub const ALL: [GapTopic; 4] = [
        GapTopic::DatosFaltantes,
        GapTopic::CoberturasYLimites,
        GapTopic::ExclusionesYCondiciones,
        GapTopic::AnexosYOtros,
    ];

    pub fn key(self) -> &'static str {
        match self {
            GapTopic::DatosFaltantes => "datosFaltantes",
            GapTopic::CoberturasYLimites => "coberturasYLimites",
            GapTopic::ExclusionesYCondiciones => "exclusionesYCondiciones",
            GapTopic::AnexosYOtros => "anexosYOtros",
        }
    }

    /// Temas de la primera pasada que este grupo contrasta con el original.
    pub fn topics(self) -> &'static [Topic] {
        match self {
            GapTopic::DatosFaltantes => &[Topic::InformacionGeneral, Topic::DatosGenerales],
            GapTopic::CoberturasYLimites => &[Topic::Coberturas, Topic::LimitesYSublimites],
            GapTopic::ExclusionesYCondiciones => &[Topic::Exclusiones, Topic::Condiciones],
            GapTopic::AnexosYOtros => &[
                Topic::MateriaAsegurada,
                Topic::AnexosYEndosos,
                Topic::DeduciblesYFranquicias,
            ],
        }
    }
}

impl fmt::Display for GapTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Resultado del analizador por secciones: tema → texto (o marcador de error).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct TopicAnalysis(HashMap<Topic, String>);

impl TopicAnalysis {
    pub fn get(&self, topic: Topic) -> &str {
        self.0.get(&topic).map(String::as_str).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<Topic, String>> for TopicAnalysis {
    fn from(map: HashMap<Topic, String>) -> Self {
        Self(map)
    }
}

/// Resultado de la búsqueda complementaria.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct GapFindings(HashMap<GapTopic, String>);

impl GapFindings {
    pub fn get(&self, gap: GapTopic) -> &str {
        self.0.get(&gap).map(String::as_str).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &GapTopic> {
        self.0.keys()
    }

    /// Une los hallazgos en el orden fijo de `GapTopic::ALL`, separados por
    /// una línea en blanco.
    pub fn combined(&self) -> String {
        GapTopic::ALL
            .iter()
            .filter_map(|gap| self.0.get(gap))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl From<HashMap<GapTopic, String>> for GapFindings {
    fn from(map: HashMap<GapTopic, String>) -> Self {
        Self(map)
    }
}

/// Toda la información extraída de un documento, unidad atómica de la
/// comparación.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentBundle {
    pub id: String,
    pub filename: String,
    #[serde(skip)]
    pub text: String,
    pub analysis: TopicAnalysis,
    pub gaps: GapFindings,
}

impl DocumentBundle {
    /// Bloque "información completa" con las cabeceras en orden fijo.
    pub fn complete_info(&self) -> String {
        let a = &self.analysis;
        format!(
            "INFORMACIÓN EXTRAÍDA:
<Extraído>
Búsqueda Complementaria:
{}

Información General:
{}

Datos Generales:
{}

Materia Asegurada:
{}

Coberturas:
{}

Límites y Sublímites:
{}

Deducibles y Franquicias:
{}

Exclusiones:
{}

Condiciones:
{}

ANEXOS Y ENDOSOS:
{}
</Extraído>",
            self.gaps.combined(),
            a.get(Topic::InformacionGeneral),
            a.get(Topic::DatosGenerales),
            a.get(Topic::MateriaAsegurada),
            a.get(Topic::Coberturas),
            a.get(Topic::LimitesYSublimites),
            a.get(Topic::DeduciblesYFranquicias),
            a.get(Topic::Exclusiones),
            a.get(Topic::Condiciones),
            a.get(Topic::AnexosYEndosos),
        )
    }
}

/// Resultado del modo de documento único.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub verification: String,
    pub final_summary: String,
}

/// Resultado del modo comparación.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub comparison: String,
    pub document_infos: Vec<DocumentBundle>,
}

impl ComparisonReport {
    pub fn filenames(&self) -> Vec<String> {
        self.document_infos
            .iter()
            .map(|doc| doc.filename.clone())
            .collect()
    }
}
