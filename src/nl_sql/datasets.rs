//! Static dataset descriptors: DDL, generation rules and bad/good examples
//!
//! Each supported dataset is a fixed schema domain the service can answer
//! questions about. Descriptors are plain data compiled into the binary.

use crate::nl_sql::error::{NlSqlError, NlSqlResult};
use serde::Serialize;
use std::fmt;

/// Identifier of a supported dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DatasetId(u8);

impl DatasetId {
    pub const FACTORY: DatasetId = DatasetId(1);
    pub const RAW_MATERIAL: DatasetId = DatasetId(2);
    pub const LINE_PERFORMANCE: DatasetId = DatasetId(3);

    pub const ALL: [DatasetId; 3] = [
        DatasetId::FACTORY,
        DatasetId::RAW_MATERIAL,
        DatasetId::LINE_PERFORMANCE,
    ];

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for DatasetId {
    type Error = NlSqlError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        DatasetId::ALL
            .into_iter()
            .find(|id| i64::from(id.0) == value)
            .ok_or(NlSqlError::UnsupportedDataset(value))
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything the prompt needs to know about one dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub id: DatasetId,
    pub name: &'static str,
    pub ddl: &'static str,
    pub rules: &'static str,
    pub examples: &'static str,
}

/// Look up the descriptor of a dataset identifier
pub fn get_descriptor(dataset_id: i64) -> NlSqlResult<&'static DatasetDescriptor> {
    let id = DatasetId::try_from(dataset_id)?;
    Ok(descriptor(id))
}

/// Descriptor of an already validated identifier
pub fn descriptor(id: DatasetId) -> &'static DatasetDescriptor {
    match id {
        DatasetId::RAW_MATERIAL => &DESCRIPTORS[1],
        DatasetId::LINE_PERFORMANCE => &DESCRIPTORS[2],
        _ => &DESCRIPTORS[0],
    }
}

/// All descriptors in identifier order
pub fn all_descriptors() -> &'static [DatasetDescriptor] {
    &DESCRIPTORS
}

static DESCRIPTORS: [DatasetDescriptor; 3] = [
    DatasetDescriptor {
        id: DatasetId::FACTORY,
        name: "Factory structure",
        ddl: FACTORY_DDL,
        rules: FACTORY_RULES,
        examples: FACTORY_EXAMPLES,
    },
    DatasetDescriptor {
        id: DatasetId::RAW_MATERIAL,
        name: "Raw material yield",
        ddl: RAW_MATERIAL_DDL,
        rules: RAW_MATERIAL_RULES,
        examples: RAW_MATERIAL_EXAMPLES,
    },
    DatasetDescriptor {
        id: DatasetId::LINE_PERFORMANCE,
        name: "Line performance",
        ddl: LINE_PERFORMANCE_DDL,
        rules: LINE_PERFORMANCE_RULES,
        examples: LINE_PERFORMANCE_EXAMPLES,
    },
];

const FACTORY_DDL: &str = r#"CREATE TABLE Factory (
    Id           INT           NOT NULL PRIMARY KEY,
    Definition   VARCHAR(50)   NOT NULL,
    CreateDate   DATETIME      NOT NULL DEFAULT GETDATE(),
    UpdateDate   DATETIME      NULL
);

CREATE TABLE Area (
    Id           INT           NOT NULL PRIMARY KEY,
    Definition   VARCHAR(50)   NOT NULL,
    FactoryId    INT           NOT NULL,
    CreateDate   DATETIME      NOT NULL DEFAULT GETDATE(),
    UpdateDate   DATETIME      NULL,
    CONSTRAINT FK_Area_Factory FOREIGN KEY (FactoryId) REFERENCES Factory(Id)
);

CREATE TABLE Line (
    Id           INT           NOT NULL PRIMARY KEY,
    Definition   VARCHAR(50)   NOT NULL,
    AreaId       INT           NOT NULL,
    CreateDate   DATETIME      NOT NULL DEFAULT GETDATE(),
    UpdateDate   DATETIME      NULL,
    CONSTRAINT FK_Line_Area FOREIGN KEY (AreaId) REFERENCES Area(Id)
);

CREATE TABLE Station (
    Id           INT           NOT NULL PRIMARY KEY,
    Definition   VARCHAR(50)   NOT NULL,
    LineId       INT           NOT NULL,
    CreateDate   DATETIME      NOT NULL DEFAULT GETDATE(),
    UpdateDate   DATETIME      NULL,
    CONSTRAINT FK_Station_Line FOREIGN KEY (LineId) REFERENCES Line(Id)
);

CREATE TABLE Unit (
    Id           INT           NOT NULL PRIMARY KEY,
    Definition   VARCHAR(50)   NOT NULL,
    StationId    INT           NOT NULL,
    CreateDate   DATETIME      NOT NULL DEFAULT GETDATE(),
    UpdateDate   DATETIME      NULL,
    CONSTRAINT FK_Unit_Station FOREIGN KEY (StationId) REFERENCES Station(Id)
);

CREATE TABLE Machine (
    Id           INT           NOT NULL PRIMARY KEY,
    Definition   VARCHAR(50)   NOT NULL,
    BrandId      INT           NULL,
    ModelId      INT           NULL,
    UnitId       INT           NOT NULL,
    SapCode      INT           NULL,
    CreateDate   DATETIME      NOT NULL DEFAULT GETDATE(),
    UpdateDate   DATETIME      NULL,
    CONSTRAINT FK_Machine_Unit FOREIGN KEY (UnitId) REFERENCES Unit(Id)
);

CREATE TABLE Plc (
    Id           INT           NOT NULL PRIMARY KEY,
    Definition   VARCHAR(50)   NOT NULL,
    MachineId    INT           NOT NULL,
    BrandId      INT           NULL,
    ModelId      INT           NULL,
    IpAddress    VARCHAR(16)   NULL,
    CreateDate   DATETIME      NOT NULL DEFAULT GETDATE(),
    UpdateDate   DATETIME      NULL,
    Status       TINYINT       NOT NULL DEFAULT 1,
    PlcType      TINYINT       NULL,
    CONSTRAINT FK_Plc_Machine FOREIGN KEY (MachineId) REFERENCES Machine(Id)
);

CREATE TABLE PlcTag (
    Id                           INT            NOT NULL PRIMARY KEY,
    FactoryId                    INT            NOT NULL,
    PlcId                        INT            NOT NULL,
    Title                        VARCHAR(100)   NOT NULL,
    TagName                      VARCHAR(100)   NOT NULL,
    MinValue                     VARCHAR(50)    NULL,
    MaxValue                     VARCHAR(50)    NULL,
    Value                        VARCHAR(50)    NULL,
    IsAlarm                      BIT            NOT NULL DEFAULT 0,
    SmsNotification              BIT            NOT NULL DEFAULT 0,
    MailNotification             BIT            NOT NULL DEFAULT 0,
    NotificationCycleCounter     INT            NULL,
    NotificationCycleValue       INT            NULL,
    NotificationTimeValue        INT            NULL,
    NotificationTransmissionTime DATETIME       NULL,
    AlarmValue                   VARCHAR(50)    NULL,
    NotificationType             TINYINT        NULL,
    CreatedDate                  DATETIME       NOT NULL DEFAULT GETDATE(),
    UnitTypeId                   INT            NULL,
    CONSTRAINT FK_PlcTag_Factory FOREIGN KEY (FactoryId) REFERENCES Factory(Id),
    CONSTRAINT FK_PlcTag_Plc     FOREIGN KEY (PlcId)     REFERENCES Plc(Id)
);"#;

const FACTORY_RULES: &str = r#"### STRICT SQL RULES

1. DDL CONFORMANCE
   - Use ONLY the tables and columns defined in the DDL below.
   - Forbidden column guesses:
     * {table}.Name    -> use {table}.Definition
     * {table}.Updated -> use {table}.UpdateDate
     * {table}.Created -> use {table}.CreateDate

2. JOIN HIERARCHY
   - Factory -> Area -> Line -> Station -> Unit -> Machine -> Plc -> PlcTag
   - Never skip a level (e.g. Factory directly to Line).
   - Do not add joins a single-table question does not need.

3. QUERY PURITY
   - Exactly one SELECT statement, terminated by ';'. WITH (CTE) is allowed.
   - Never use INSERT, UPDATE, DELETE, EXEC, ALTER or MERGE.

4. COLUMN REFERENCES
   - Every column is written as <alias>.<column>, e.g. F.Definition, PT.TagName.

5. SPECIAL CASES
   - Date ranges use half-open intervals:
       WHERE PT.CreatedDate >= '2025-01-01' AND PT.CreatedDate < '2025-02-01'
   - Random rows: SELECT TOP (5) ... ORDER BY NEWID() (there is no LIMIT).

6. DISTINCT NAMES
   - "Different names" means DISTINCT over the Definition column of the requested table.

7. FILTERS
   - Apply a filter on the table the question names, joining down the hierarchy:
       SELECT M.Id, M.Definition
       FROM Machine M
       JOIN Unit    U ON U.Id = M.UnitId
       JOIN Station S ON S.Id = U.StationId
       JOIN Line    L ON L.Id = S.LineId
       WHERE L.Definition = 'polycarbonate carboy line';

8. NUMERIC COMPARISONS
   - A VARCHAR column compared with a number must be converted first:
       TRY_CONVERT(decimal(18,3), REPLACE(<alias>.<column>, ',', '.'))"#;

const FACTORY_EXAMPLES: &str = r#"-- BAD: missing join, AreaName may be NULL
SELECT L.Definition AS LineName
FROM Line L
JOIN Station S ON S.LineId = L.Id;

-- GOOD: only the Machine table
SELECT M.Id, M.Definition
FROM Machine M;

-- BAD: BETWEEN upper bound is ambiguous
SELECT *
FROM PlcTag PT
WHERE PT.CreatedDate BETWEEN '2025-06-01' AND '2025-06-30';

-- GOOD: calendar range
SELECT *
FROM PlcTag PT
WHERE PT.CreatedDate >= '2025-06-01'
  AND PT.CreatedDate <  '2025-07-01';"#;

const RAW_MATERIAL_DDL: &str = r#"CREATE TABLE [dbo].[Pursu_hammadde_verimleri] (
    [Id]                            INT            IDENTITY(1,1) NOT NULL PRIMARY KEY,
    [Seri_No]                       INT            NOT NULL,
    [Malzeme_kodu]                  VARCHAR(20)    NOT NULL,
    [Malzeme_adi]                   VARCHAR(100)   NOT NULL,
    [Devralinan_miktar]             INT            NULL,
    [Depo_giris_adedi]              INT            NULL,
    [Kullanilan_miktar]             INT            NULL,
    [Fire]                          INT            NULL,
    [Toplam_kullanilan]             INT            NULL,
    [Kalan_miktar]                  INT            NULL,
    [Euro_palet_kullanim]           DECIMAL(18,3)  NULL,
    [Üretilebilecek_palet_euro]     INT            NULL,
    [Standart_palet_kullanim]       DECIMAL(18,3)  NULL,
    [Üretilebilecek_palet_standart] INT            NULL,
    [Gunluk_kullanim]               DECIMAL(18,3)  NULL,
    [Üretilebilecek_palet_gunluk]   INT            NULL,
    [date_time]                     DATETIME       NOT NULL
);"#;

const RAW_MATERIAL_RULES: &str = r#"### SQL RULES
- Use only the columns of [dbo].[Pursu_hammadde_verimleri] defined in the DDL below.
- Exactly one SELECT statement (WITH allowed), terminated by ';'.
- Date ranges use half-open intervals on date_time."#;

const RAW_MATERIAL_EXAMPLES: &str = r#"-- GOOD: latest remaining quantity per material
SELECT H.Malzeme_kodu, H.Malzeme_adi, H.Kalan_miktar
FROM Pursu_hammadde_verimleri H
WHERE H.date_time >= '2025-06-01' AND H.date_time < '2025-07-01';"#;

const LINE_PERFORMANCE_DDL: &str = r#"CREATE TABLE [dbo].[Pursu_hat_verileri] (
    [Id]                        INT            IDENTITY(1,1) NOT NULL PRIMARY KEY,
    [hat_name]                  NVARCHAR(50)   NOT NULL,
    [urun1_deger]               INT            NULL,
    [urun_aciklama]             NVARCHAR(100)  NULL,
    [urun2_deger]               INT            NULL,
    [urun2_aciklama]            NVARCHAR(100)  NULL,
    [urun3_deger]               INT            NULL,
    [urun3_aciklama]            NVARCHAR(100)  NULL,
    [uretim_zamani_dk]          INT            NULL,
    [net_uretim_zamani_dk]      INT            NULL,
    [teknik_uretim_zamani_dk]   INT            NULL,
    [operasyonel_verimlilik]    FLOAT          NULL,
    [uretim_verimlilik]         FLOAT          NULL,
    [kapasite_kullanim_orani]   FLOAT          NULL,
    [teknik_durus_kayip_orani]  FLOAT          NULL,
    [date]                      DATE           NOT NULL,
    [date_time]                 DATETIME       NOT NULL
);"#;

const LINE_PERFORMANCE_RULES: &str = r#"### SQL RULES
- Use only the columns of [dbo].[Pursu_hat_verileri] defined in the DDL below.
- Exactly one SELECT statement (WITH allowed), terminated by ';'.
- Group by hat_name when the question asks per line."#;

const LINE_PERFORMANCE_EXAMPLES: &str = r#"-- GOOD: average operational efficiency per line
SELECT H.hat_name, AVG(H.operasyonel_verimlilik) AS avg_efficiency
FROM Pursu_hat_verileri H
GROUP BY H.hat_name;"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_every_dataset_has_ddl() {
        for descriptor in all_descriptors() {
            assert!(!descriptor.ddl.trim().is_empty(), "{} has no DDL", descriptor.id);
            assert!(!descriptor.name.is_empty());
        }
    }

    #[rstest]
    #[case(1, "Factory structure")]
    #[case(2, "Raw material yield")]
    #[case(3, "Line performance")]
    fn test_get_descriptor(#[case] id: i64, #[case] name: &str) {
        let descriptor = get_descriptor(id).unwrap();
        assert_eq!(i64::from(descriptor.id.get()), id);
        assert_eq!(descriptor.name, name);
    }

    #[rstest]
    #[case(0)]
    #[case(4)]
    #[case(-1)]
    #[case(i64::MAX)]
    fn test_unsupported_dataset(#[case] id: i64) {
        let err = get_descriptor(id).unwrap_err();
        assert!(matches!(err, NlSqlError::UnsupportedDataset(v) if v == id));
    }

    #[test]
    fn test_factory_ddl_has_no_name_column_on_factory() {
        let factory = get_descriptor(1).unwrap();
        assert!(factory.ddl.contains("CREATE TABLE Factory"));
        assert!(!factory.ddl.contains("    Name "));
    }
}
