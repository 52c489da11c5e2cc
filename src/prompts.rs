//! Prompts del pipeline de análisis de pólizas.
//!
//! Las instrucciones de sistema son constantes; los prompts de usuario se
//! construyen con el texto del documento y los resultados de etapas previas.

use chrono::{Datelike, NaiveDate};

use crate::models::{GapFindings, GapTopic, Topic, TopicAnalysis};

pub const ANALYST_SYSTEM_PROMPT: &str = "Eres un asistente especializado en análisis de documentos de seguros. \
Realiza un análisis detallado y preciso del documento proporcionado, identificando toda la información relevante. \
Proporciona respuestas exhaustivas y bien estructuradas. \
No omitas ninguna información: cada dato del documento es importante para el informe final.";

pub const GAP_SYSTEM_PROMPT: &str = "Eres un asistente especializado en análisis de documentos de seguros. \
Tu tarea es identificar información que haya podido quedar fuera del análisis inicial. \
Sé preciso y conciso en tu respuesta.";

pub const VERIFY_SYSTEM_PROMPT: &str = "Eres un asistente especializado en análisis de documentos de seguros. \
Tu tarea es verificar y resumir de manera profesional toda la información extraída del documento.";

pub const REPORT_SYSTEM_PROMPT: &str = "Eres un experto en seguros generando informes profesionales. \
Crea un informe completo, bien estructurado y exhaustivo con toda la información proporcionada.";

pub const COMPARISON_SYSTEM_PROMPT: &str = "Eres un experto en seguros especializado en análisis comparativos. \
Tu objetivo es crear un informe detallado que compare varios documentos de seguros, \
destacando similitudes, diferencias y ofreciendo recomendaciones claras.";

/// Marcador con el que debe empezar el informe final.
pub const REPORT_TITLE_MARKER: &str = "**INFORME";

/// Caracteres del documento original incluidos en el prompt de verificación.
pub const VERIFICATION_CONTEXT_CHARS: usize = 50_000;

const REPORT_SIGNATURE: &str = "___________________________
  Firma,
  **Insurance Copilot**
  (*Análisis Automatizado de Pólizas*)*.";

const FORMAT_GUIDELINES: &str = "Formato y estilo:
- Utiliza un estilo profesional pero accesible
- Mantén la consistencia en tiempo verbal, terminología y formato
- Evita el exceso de jerga técnica sin las explicaciones correspondientes
- Prioriza la claridad sobre la complejidad
- Utiliza un lenguaje preciso y directo

Uso específico de formatos:
- Tablas: Úsalas para organizar datos comparativos, estadísticas, criterios de evaluación, cronogramas y categorizaciones.
- Párrafos: Empléalos para desarrollar argumentos, proporcionar contexto, explicar conceptos complejos y presentar análisis detallados.
- Bullet points: Limita su uso a listas breves de elementos simples, requisitos específicos o puntos de acción.
- Numeración: Reserva este formato para procedimientos secuenciales, pasos de un proceso o jerarquías de prioridad.";

fn topic_instruction(topic: Topic) -> &'static str {
    match topic {
        Topic::InformacionGeneral => "Analiza detalladamente este documento de seguro e identifica:

1) Tipo específico de documento (póliza, cotización, endoso, etc.)

2) Vigencia del documento (fechas de inicio y fin)

3) Estatus actual (vigente, en renovación, cancelado, etc.)

4) Metadatos básicos (número de póliza/cotización, fecha de emisión, aseguradora)",
        Topic::DatosGenerales => "Identifica y extrae todos los datos generales de la póliza:

- Número de póliza o cotización
- Nombre completo de la aseguradora
- Datos completos del contratante/tomador (nombre, dirección, identificación fiscal)
- Datos del asegurado (si es distinto del contratante)
- Datos del beneficiario (si aplica)
- Vigencia exacta (fecha y hora de inicio y término)
- Moneda de la póliza y tipo de cambio aplicable (si corresponde)
- Nombre del intermediario o corredor de seguros
- Forma de pago, periodicidad y fechas de vencimiento
- Prima total y desglose detallado (prima neta, impuestos, recargos, descuentos)",
        Topic::MateriaAsegurada => "Extrae detalladamente la información sobre la materia asegurada:

- Descripción completa de los bienes asegurados
- Ubicaciones geográficas específicas cubiertas
- Valoraciones y métodos de valoración utilizados
- Categorización de bienes (si aplica)
- Características específicas o distintivas de la materia asegurada
- Identificadores únicos (números de serie, matrículas, referencias catastrales)
- Condiciones especiales para la materia asegurada
- Restricciones de uso o requisitos de mantenimiento",
        Topic::Coberturas => "Identifica y detalla todas las coberturas incluidas en la póliza:
- Listado completo de coberturas principales
- Descripción detallada de lo que incluye cada cobertura
- Ámbito temporal y territorial de cada cobertura
- Coberturas opcionales contratadas
- Ampliaciones específicas de cobertura
- Condiciones especiales para activación de coberturas
- Categorización de coberturas (básicas, complementarias, opcionales)
- Relaciones o interdependencias entre coberturas",
        Topic::LimitesYSublimites => "Extrae todos los límites y sublímites establecidos:
- Suma asegurada total y método de valoración
- Límites específicos por ubicación o instalación
- Límites por evento, siniestro o agregado anual
- Sublímites para cada cobertura específica
- Valores máximos asegurados por categoría o ítem
- Indemnizaciones diarias o periódicas (si aplica)
- Cláusulas de reposición de suma asegurada
- Sistemas de ajuste o actualización de límites",
        Topic::DeduciblesYFranquicias => "Identifica todos los deducibles y franquicias aplicables:
- Deducible general de la póliza
- Deducibles específicos por cobertura o tipo de siniestro
- Deducibles expresados en porcentaje, monto fijo o mixtos
- Mínimos y máximos aplicables a deducibles
- Franquicias y su funcionamiento exacto
- Períodos de carencia para coberturas específicas
- Períodos de espera aplicables (especialmente en lucro cesante)
- Mecanismos de aplicación de deducibles en siniestros múltiples",
        Topic::Exclusiones => "Identifica y detalla todas las exclusiones presentes en la póliza:
- Exclusiones generales aplicables a toda la póliza
- Exclusiones específicas por cobertura
- Bienes expresamente excluidos
- Actividades o usos excluidos
- Circunstancias o eventos excluidos
- Exclusiones temporales o geográficas
- Exclusiones relacionadas con incumplimiento de garantías
- Exclusiones absolutas vs. exclusiones que pueden cubrirse mediante endoso",
        Topic::Condiciones => "Detalla todas las condiciones importantes de la póliza:
- Condiciones generales y particulares relevantes
- Cláusulas adicionales específicas
- Garantías o requisitos de seguridad obligatorios
- Cláusulas de cancelación y sus términos
- Procedimientos y plazos para avisos de siniestros
- Obligaciones del asegurado en caso de siniestro
- Procedimientos de ajuste y liquidación
- Cláusulas de infraseguro o sobreseguro
- Jurisdicción aplicable y mecanismos de resolución de conflictos",
        Topic::AnexosYEndosos => "Identifica y detalla todos los anexos y endosos de la póliza:
- Listado completo de endosos incluidos
- Propósito y efecto de cada endoso
- Fecha de emisión de cada endoso
- Modificaciones específicas introducidas por cada endoso
- Detalles completos de bienes asegurados en anexos
- Detalles de ubicaciones cubiertas en anexos
- Beneficiarios designados en documentos anexos
- Cualquier otro documento adjunto o relacionado",
    }
}

/// Cabecera con la que cada tema aparece dentro de los bloques `<Extracción>`.
pub fn topic_heading(topic: Topic) -> &'static str {
    match topic {
        Topic::InformacionGeneral => "Información General",
        Topic::DatosGenerales => "Datos Generales",
        Topic::MateriaAsegurada => "Materia Asegurada",
        Topic::Coberturas => "Coberturas",
        Topic::LimitesYSublimites => "Límites y Sublímites",
        Topic::DeduciblesYFranquicias => "Deducibles y Franquicias",
        Topic::Exclusiones => "Exclusiones",
        Topic::Condiciones => "Condiciones",
        Topic::AnexosYEndosos => "Anexos y Endosos",
    }
}

pub fn topic_prompt(topic: Topic, content: &str) -> String {
    let context = match topic {
        Topic::InformacionGeneral => {
            "Estoy analizando una Póliza o Cotización de Póliza de seguros"
        }
        _ => "Estoy analizando un documento PDF de seguros",
    };
    format!(
        "{}\n\nCONTEXTO: {} con el siguiente contenido:\n{}",
        topic_instruction(topic),
        context,
        content
    )
}

fn gap_task(gap: GapTopic) -> &'static str {
    match gap {
        GapTopic::DatosFaltantes => "datos generales o metadatos del documento",
        GapTopic::CoberturasYLimites => "coberturas y límites",
        GapTopic::ExclusionesYCondiciones => "exclusiones y condiciones",
        GapTopic::AnexosYOtros => {
            "materia asegurada, anexos, endosos, deducibles o franquicias"
        }
    }
}

pub fn gap_prompt(gap: GapTopic, content: &str, analysis: &TopicAnalysis) -> String {
    let extracted = gap
        .topics()
        .iter()
        .map(|topic| format!("{}:\n\"{}\"", topic_heading(*topic), analysis.get(*topic)))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "CONTEXTO IMPORTANTE:
Documento Original:
<Original> {content} </Original>

Datos extraidos sobre el documento:
<Extracción>
{extracted}
</Extracción>

TAREA:
Identifica cualquier información importante sobre {} que NO haya sido capturada en la extracción inicial.",
        gap_task(gap)
    )
}

/// Bloque con los temas indicados, en ese orden.
fn extracted_block(analysis: &TopicAnalysis, topics: &[Topic]) -> String {
    topics
        .iter()
        .map(|topic| format!("{}:\n{}", topic_heading(*topic), analysis.get(*topic)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prefijo de `text` de como mucho `max_chars` caracteres.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn verification_prompt(content: &str, analysis: &TopicAnalysis, gaps: &GapFindings) -> String {
    format!(
        "Contenido PDF Original:
<Original> {}... </Original>

CONSULTA ORIGINAL DEL USUARIO:
'Resume este PDF'

INFORMACIÓN EXTRAÍDA:
<Extraído>
Búsqueda Complementaria:
{}

{}
</Extraído>

TAREA:
Realiza una verificación exhaustiva de la información encontrada:

1. ¿Se ha respondido directamente a la consulta del usuario? ¿Completamente o parcialmente?
2. ¿Existe alguna inconsistencia o contradicción en la información encontrada?
3. ¿Quedaron aspectos de la consulta sin responder? ¿Cuáles?
4. ¿La información encontrada es suficiente y clara para responder al usuario?
5. ¿Hay información en las secciones temáticas que complementa o contradice la extracción dirigida?

Proporciona un análisis detallado de la calidad y completitud de la información.

Sepáralo en dos partes: 1) Análisis de Verificación y 2) Análisis de Completitud.",
        truncate_chars(content, VERIFICATION_CONTEXT_CHARS),
        gaps.combined(),
        extracted_block(analysis, &Topic::ALL),
    )
}

pub const SUMMARY_PART1_TOPICS: [Topic; 4] = [
    Topic::InformacionGeneral,
    Topic::DatosGenerales,
    Topic::MateriaAsegurada,
    Topic::Coberturas,
];

pub const SUMMARY_PART2_TOPICS: [Topic; 5] = [
    Topic::LimitesYSublimites,
    Topic::DeduciblesYFranquicias,
    Topic::Exclusiones,
    Topic::Condiciones,
    Topic::AnexosYEndosos,
];

pub fn summary_part1_prompt(analysis: &TopicAnalysis) -> String {
    format!(
        "INFORMACIÓN EXTRAÍDA (PARTE 1):
<Extraído>
{}
</Extraído>

TAREA:
Genera la primera parte de un resumen para un informe de seguros con toda esta información. \
El formato debe ser profesional y detallado. Incluirá una parte inicial clara analizando la información general, \
los datos generales, la materia asegurada y las coberturas.

No incluyas introducción ni conclusión ya que esto es solo la primera parte del resumen completo.",
        extracted_block(analysis, &SUMMARY_PART1_TOPICS)
    )
}

pub fn summary_part2_prompt(analysis: &TopicAnalysis, gaps: &GapFindings) -> String {
    format!(
        "INFORMACIÓN EXTRAÍDA (PARTE 2):
<Extraído>
{}

Búsqueda Complementaria:
{}
</Extraído>

TAREA:
Genera la segunda parte de un resumen para un informe de seguros con toda esta información. \
El formato debe ser profesional y detallado. Incluirá información sobre límites, deducibles, exclusiones, \
condiciones y anexos.

No incluyas introducción ya que esto es la continuación de la primera parte.",
        extracted_block(analysis, &SUMMARY_PART2_TOPICS),
        gaps.combined()
    )
}

const MESES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Fecha del informe en formato largo español: `05 de marzo de 2026`.
pub fn format_report_date(date: NaiveDate) -> String {
    format!(
        "{:02} de {} de {}",
        date.day(),
        MESES[date.month0() as usize],
        date.year()
    )
}

pub fn final_report_prompt(verification: &str, combined_summary: &str, report_date: &str) -> String {
    format!(
        "VERIFICACIÓN:
{verification}

RESUMEN COMBINADO:
{combined_summary}

TAREA:
Por favor genera un informe completo con toda la información como corresponde, en formato de informe firmado:

Tu respuesta debe comenzar por **INFORME DE [Tipo de Documento] - [Nombre del Asegurado]** ...

Tu respuesta debe terminar con:
{REPORT_SIGNATURE}

Sobre el informe:

{FORMAT_GUIDELINES}

Debes incluir TODOS los puntos relevantes, sin omitir información o dar información parcial.

Fecha del informe: {report_date}."
    )
}

pub fn comparison_prompt(documents: &[(String, String)], report_date: &str) -> String {
    let blocks = documents
        .iter()
        .map(|(filename, info)| format!("DOCUMENTO: {filename}\n{info}"))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "TAREA: COMPARACIÓN DE DOCUMENTOS DE SEGUROS

Has recibido {count} documentos de seguros para comparar. A continuación se presenta la información completa extraída de cada documento:

{blocks}

INSTRUCCIONES PARA LA COMPARACIÓN:

1. Realiza un análisis comparativo detallado de los documentos presentados, identificando:
   - Similitudes clave en coberturas, condiciones y términos
   - Diferencias significativas en límites, exclusiones y deducibles
   - Ventajas y desventajas relativas de cada documento

2. Organiza la comparación por categorías:
   - Datos generales y tipo de documento
   - Coberturas y límites
   - Exclusiones y condiciones
   - Deducibles y franquicias
   - Cualquier otra categoría relevante

3. Utiliza tablas para presentar comparaciones directas de valores numéricos o características específicas.

4. Incluye un análisis final con recomendaciones sobre qué documento ofrece mejores condiciones según diferentes criterios (precio, amplitud de cobertura, menos exclusiones, etc.)

5. Formato del informe:
   - Título: \"INFORME COMPARATIVO DE DOCUMENTOS DE SEGUROS\"
   - Incluye una introducción que mencione los documentos comparados
   - Organiza el contenido en secciones claramente diferenciadas
   - Concluye con un resumen de los hallazgos clave y recomendaciones
   - Firma como \"Insurance Copilot - Análisis Comparativo Automatizado\"

Fecha del informe: {report_date}.",
        count = documents.len(),
    )
}
