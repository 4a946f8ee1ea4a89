//! Consultation prompt for the generative model.

use std::fmt::{Display, Write};

use crate::clinical::ClinicalHistory;
use crate::demographics::PatientDemographics;
use crate::environment::EnvironmentalTable;
use crate::timestamp::Timestamp;

const MISSING_CELL: &str = "NaN";

/// Render the merged table as fixed-width text, absent cells as `NaN`
pub fn render_table(table: &EnvironmentalTable) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<22}{:>6}{:>14}{:>22}",
        "time", "aqi", "temperature", "apparent_temperature"
    );
    for sample in table.samples() {
        let _ = writeln!(
            out,
            "{:<22}{:>6}{:>14}{:>22}",
            sample.timestamp.to_string(),
            cell(sample.aqi),
            cell(sample.temperature_f),
            cell(sample.apparent_temperature_f)
        );
    }
    out
}

fn cell<T: Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| MISSING_CELL.to_string())
}

fn bullet_list<T: Display>(items: &[T]) -> String {
    if items.is_empty() {
        return "None recorded".to_string();
    }
    items
        .iter()
        .map(|item| format!("\n    - {}", item))
        .collect()
}

pub fn build_prompt(
    demographics: &PatientDemographics,
    history: &ClinicalHistory,
    now: Timestamp,
    table: &EnvironmentalTable,
) -> String {
    format!(
        r#"
    -------------------------------
    Prompt Context

    You have been approached by a healthcare professional seeking consultation on how to mitigate the health risks or treat the health complications
    associated with climate-related events, such as heat waves or forest fires. Your role as the AI specialist is to provide a consultation based on
    the specific characteristics and surrounding environment of the patient, like their demographics, health conditions, medications, encounter history, AQI,
    temperature, and apparent temperature.
    -------------------------------
    Patient Details

    Sex: {sex}
    Date of Birth: {birth_date}
    Health Conditions: {conditions}
    Encounters: {encounters}
    Medication Administrations: {medications}

    Here is the past, present, and forecasted environmental data (in a tabular format) for the patient's primary address. Its columns include time,
    air quality index measurements (AQI), temperature (Fahrenheit), and apparent temperature (Fahrenheit). Right now, the current datetime is {now}.
    Please note that the AQI data and temperature data may not perfectly overlap in time, as they are collected from different sources. NaN values at the
    beginning and end of the time range should not be considered as missing data, but rather as the absence of data.

{table}
    -------------------------------
    "#,
        sex = demographics.sex,
        birth_date = demographics.birth_date_display(),
        conditions = bullet_list(&history.conditions),
        encounters = bullet_list(&history.encounters),
        medications = bullet_list(&history.medication_administrations),
        now = now,
        table = render_table(table),
    )
}
