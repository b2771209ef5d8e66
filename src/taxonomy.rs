//! Topic registry: the unit → major topic → minor topic hierarchy that catalog
//! labels are drawn from. Filters are checked against it before retrieval so a
//! misspelled label fails loudly instead of matching nothing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::TaxonomyFilter;
use crate::error::TaxonomyError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MajorTopic {
  pub name: String,
  #[serde(default)]
  pub minor_topics: Vec<String>,
}

/// A subject (e.g. "통합과학 1") with its major topics.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
  pub name: String,
  #[serde(default)]
  pub major_topics: Vec<MajorTopic>,
}

#[derive(Clone, Debug)]
pub struct TaxonomyRegistry {
  units: Vec<Unit>,
  major_of_minor: HashMap<String, String>,
}

impl TaxonomyRegistry {
  pub fn new(units: Vec<Unit>) -> Self {
    let mut major_of_minor = HashMap::new();
    for unit in &units {
      for major in &unit.major_topics {
        for minor in &major.minor_topics {
          major_of_minor.insert(minor.clone(), major.name.clone());
        }
      }
    }
    Self { units, major_of_minor }
  }

  /// Integrated-science hierarchy the catalog is ingested against.
  pub fn builtin() -> Self {
    fn major(name: &str, minors: &[&str]) -> MajorTopic {
      MajorTopic {
        name: name.into(),
        minor_topics: minors.iter().map(|m| m.to_string()).collect(),
      }
    }

    Self::new(vec![
      Unit {
        name: "통합과학 1".into(),
        major_topics: vec![
          major("과학의 기초", &["시간과 공간", "기본량과 단위", "측정과 측정 표준", "정보와 디지털 기술"]),
          major("원소의 형성", &["우주 초기에 형성된 원소", "지구와 생명체를 이루는 원소의 생성"]),
          major("물질의 규칙성과 성질", &["원소의 주기성과 화학 결합", "이온 결합과 공유 결합", "지각과 생명체 구성 물질의 규칙성", "물질의 전기적 성질"]),
          major("지구시스템", &["지구시스템의 구성 요소", "지구시스템의 상호작용", "지권의 변화"]),
          major("역학 시스템", &["중력과 역학시스템", "운동과 충돌"]),
          major("생명 시스템", &["생명 시스템의 기본 단위", "물질대사와 효소", "세포 내 정보의 흐름"]),
        ],
      },
      Unit {
        name: "통합과학 2".into(),
        major_topics: vec![
          major("지질 시대와 생물 다양성", &["지질시대의 생물과 화석", "자연선택과 진화", "생물다양성과 보전"]),
          major("화학 변화", &["산화와 환원", "산성과 염기성", "중화 반응", "물질 변화에서 에너지 출입"]),
          major("생태계와 환경 변화", &["생태계 구성 요소", "생태계 평형", "기후 변화와 지구 환경 변화"]),
          major("에너지와 지속가능한 발전", &["태양 에너지의 생성과 전환", "전기 에너지의 생산", "에너지 효율과 신재생 에너지"]),
          major("과학과 미래 사회", &["과학의 유용성과 필요성", "과학 기술 사회와 빅데이터", "과학 기술의 발전과 미래 사회", "과학 관련 사회적 쟁점과 과학 윤리"]),
        ],
      },
    ])
  }

  pub fn units(&self) -> &[Unit] {
    &self.units
  }

  pub fn has_major(&self, name: &str) -> bool {
    self
      .units
      .iter()
      .flat_map(|u| u.major_topics.iter())
      .any(|m| m.name == name)
  }

  pub fn major_of(&self, minor: &str) -> Option<&str> {
    self.major_of_minor.get(minor).map(String::as_str)
  }

  /// Every label must exist, and every minor topic must sit under one of the
  /// selected major topics.
  pub fn validate(&self, filter: &TaxonomyFilter) -> Result<(), TaxonomyError> {
    if let Some(unknown) = filter.major_topics.iter().find(|m| !self.has_major(m)) {
      return Err(TaxonomyError::UnknownMajorTopic(unknown.clone()));
    }
    for minor in &filter.minor_topics {
      let major = self
        .major_of(minor)
        .ok_or_else(|| TaxonomyError::UnknownMinorTopic(minor.clone()))?;
      if !filter.major_topics.contains(major) {
        return Err(TaxonomyError::MinorOutsideSelection {
          minor: minor.clone(),
          major: major.to_string(),
        });
      }
    }
    Ok(())
  }
}

impl Default for TaxonomyRegistry {
  fn default() -> Self {
    Self::builtin()
  }
}
