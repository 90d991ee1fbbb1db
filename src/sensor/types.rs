//! Sensor catalog and the per-tick reading snapshot.
//!
//! The catalog fixes the physical quantities a glacial-lake station reports,
//! along with the plausible range each one is clamped to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A physical quantity reported by the lake station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SensorField {
    LakeSize,
    WaterLevel,
    AirTemperature,
    FlowRate,
    GroundMovement,
    DamPressure,
    Precipitation,
    SensorAccuracy,
    LakePerimeterChange,
    SnowpackThickness,
    SoilMoisture,
    SolarRadiation,
    WaterTemperature,
    WaterTurbidity,
    WindSpeed,
    Rainfall,
    Snowfall,
}

impl SensorField {
    /// Every field, in catalog order.
    pub const ALL: [SensorField; 17] = [
        SensorField::LakeSize,
        SensorField::WaterLevel,
        SensorField::AirTemperature,
        SensorField::FlowRate,
        SensorField::GroundMovement,
        SensorField::DamPressure,
        SensorField::Precipitation,
        SensorField::SensorAccuracy,
        SensorField::LakePerimeterChange,
        SensorField::SnowpackThickness,
        SensorField::SoilMoisture,
        SensorField::SolarRadiation,
        SensorField::WaterTemperature,
        SensorField::WaterTurbidity,
        SensorField::WindSpeed,
        SensorField::Rainfall,
        SensorField::Snowfall,
    ];

    /// Column name used by the classifier and the dashboard.
    pub fn name(&self) -> &'static str {
        match self {
            SensorField::LakeSize => "Lake_Size_km2",
            SensorField::WaterLevel => "Water_Level_m",
            SensorField::AirTemperature => "Air_Temperature_C",
            SensorField::FlowRate => "Flow_Rate_m3_per_s",
            SensorField::GroundMovement => "Ground_Movement_mm",
            SensorField::DamPressure => "Dam_Pressure_MPa",
            SensorField::Precipitation => "Precipitation_mm",
            SensorField::SensorAccuracy => "Sensor_Accuracy_%",
            SensorField::LakePerimeterChange => "Lake_Perimeter_Change_m",
            SensorField::SnowpackThickness => "Snowpack_Thickness_m",
            SensorField::SoilMoisture => "Soil_Moisture_Content_%",
            SensorField::SolarRadiation => "Solar_Radiation_W_per_m2",
            SensorField::WaterTemperature => "Water_Temperature_C",
            SensorField::WaterTurbidity => "Water_Turbidity_NTU",
            SensorField::WindSpeed => "Wind_Speed_m_per_s",
            SensorField::Rainfall => "Rainfall_mm",
            SensorField::Snowfall => "Snowfall_mm",
        }
    }

    /// Look up a field by its column name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Valid `(min, max)` range for the field.
    pub fn range(&self) -> (f64, f64) {
        match self {
            SensorField::LakeSize => (0.1, 10.0),
            SensorField::WaterLevel => (0.0, 50.0),
            SensorField::AirTemperature => (-20.0, 40.0),
            SensorField::FlowRate => (0.0, 500.0),
            SensorField::GroundMovement => (0.0, 10.0),
            SensorField::DamPressure => (0.0, 10.0),
            SensorField::Precipitation => (0.0, 300.0),
            SensorField::SensorAccuracy => (90.0, 100.0),
            SensorField::LakePerimeterChange => (0.0, 50.0),
            SensorField::SnowpackThickness => (0.0, 10.0),
            SensorField::SoilMoisture => (0.0, 100.0),
            SensorField::SolarRadiation => (0.0, 1200.0),
            SensorField::WaterTemperature => (-2.0, 25.0),
            SensorField::WaterTurbidity => (0.0, 1000.0),
            SensorField::WindSpeed => (0.0, 60.0),
            SensorField::Rainfall => (0.0, 300.0),
            SensorField::Snowfall => (0.0, 200.0),
        }
    }

    /// Typical quiet-weather value, used as the random-walk starting point.
    pub fn baseline(&self) -> f64 {
        match self {
            SensorField::LakeSize => 1.5,
            SensorField::WaterLevel => 10.0,
            SensorField::AirTemperature => 15.0,
            SensorField::FlowRate => 100.0,
            SensorField::GroundMovement => 2.0,
            SensorField::DamPressure => 1.0,
            SensorField::Precipitation => 50.0,
            SensorField::SensorAccuracy => 95.0,
            SensorField::LakePerimeterChange => 5.0,
            SensorField::SnowpackThickness => 2.5,
            SensorField::SoilMoisture => 30.0,
            SensorField::SolarRadiation => 300.0,
            SensorField::WaterTemperature => 12.5,
            SensorField::WaterTurbidity => 5.0,
            SensorField::WindSpeed => 10.0,
            SensorField::Rainfall => 75.0,
            SensorField::Snowfall => 25.0,
        }
    }

    /// Temperature fields are the only ones allowed below zero.
    pub fn is_temperature(&self) -> bool {
        matches!(
            self,
            SensorField::AirTemperature | SensorField::WaterTemperature
        )
    }

    /// Width of the valid range.
    pub fn span(&self) -> f64 {
        let (min, max) = self.range();
        max - min
    }

    /// Clamp a raw value into the field's valid range.
    pub fn clamp_value(&self, value: f64) -> f64 {
        let (min, max) = self.range();
        value.clamp(min, max)
    }
}

impl std::fmt::Display for SensorField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One reading of every sensor, taken at a single instant.
///
/// Snapshots are immutable once produced. Keys are column names so that
/// snapshots loaded from JSON can carry fields the catalog doesn't know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    captured_at: DateTime<Utc>,
    values: BTreeMap<String, f64>,
}

impl SensorSnapshot {
    pub fn new(captured_at: DateTime<Utc>, values: BTreeMap<String, f64>) -> Self {
        Self {
            captured_at,
            values,
        }
    }

    /// Build a snapshot from catalog fields.
    pub fn from_fields<I>(captured_at: DateTime<Utc>, fields: I) -> Self
    where
        I: IntoIterator<Item = (SensorField, f64)>,
    {
        let values = fields
            .into_iter()
            .map(|(field, value)| (field.name().to_string(), value))
            .collect();
        Self::new(captured_at, values)
    }

    /// Parse a flat JSON object of `name -> value` pairs.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let values: BTreeMap<String, f64> = serde_json::from_str(json)?;
        Ok(Self::new(Utc::now(), values))
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn field(&self, field: SensorField) -> Option<f64> {
        self.get(field.name())
    }

    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy of this snapshot with one field dropped, as after a sensor dropout.
    pub fn without(&self, name: &str) -> Self {
        let mut values = self.values.clone();
        values.remove(name);
        Self::new(self.captured_at, values)
    }
}
