/// Known collections and name lookup for the CLI

#[derive(Debug, Clone)]
pub struct CollectionInfo {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All collections the application works with
pub const COLLECTIONS: &[CollectionInfo] = &[
  CollectionInfo {
    name: "employees",
    aliases: &["emp", "employee", "staff"],
    description: "People employed by the companies",
  },
  CollectionInfo {
    name: "leaves",
    aliases: &["leave", "absences", "pto"],
    description: "Leave requests and their decisions",
  },
  CollectionInfo {
    name: "timesheets",
    aliases: &["ts", "timesheet", "hours"],
    description: "Weekly project allocations",
  },
  CollectionInfo {
    name: "badges",
    aliases: &["badge", "access"],
    description: "Building access badges",
  },
  CollectionInfo {
    name: "contracts",
    aliases: &["contract"],
    description: "Employment contracts",
  },
  CollectionInfo {
    name: "companies",
    aliases: &["company", "co"],
    description: "Employing companies",
  },
  CollectionInfo {
    name: "trainings",
    aliases: &["training", "courses"],
    description: "Training sessions and participants",
  },
  CollectionInfo {
    name: "evaluations",
    aliases: &["eval", "evaluation", "reviews"],
    description: "Performance reviews",
  },
  CollectionInfo {
    name: "skills",
    aliases: &["skill"],
    description: "Skills referential",
  },
  CollectionInfo {
    name: "projects",
    aliases: &["project", "proj"],
    description: "Projects that hours are booked against",
  },
];

/// Exact name or alias lookup, case-insensitive.
pub fn resolve(input: &str) -> Option<&'static CollectionInfo> {
  let input_lower = input.trim().to_lowercase();
  COLLECTIONS
    .iter()
    .find(|c| c.name == input_lower || c.aliases.contains(&input_lower.as_str()))
}

fn is_subsequence(needle: &str, haystack: &str) -> bool {
  let mut chars = haystack.chars();
  needle.chars().all(|n| chars.any(|h| h == n))
}

/// Ranked candidates for a possibly misspelled collection name
pub fn suggestions(input: &str) -> Vec<&'static CollectionInfo> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COLLECTIONS.iter().collect();
  }

  let mut matches: Vec<(&CollectionInfo, u32)> = Vec::new();

  for info in COLLECTIONS {
    if info.name == input_lower {
      matches.push((info, 0));
      continue;
    }

    if info.aliases.contains(&input_lower.as_str()) {
      matches.push((info, 1));
      continue;
    }

    if info.name.starts_with(&input_lower) {
      matches.push((info, 2));
      continue;
    }

    if info.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((info, 3));
      continue;
    }

    if info.name.contains(&input_lower) {
      matches.push((info, 4));
      continue;
    }

    // Typos that drop letters, e.g. "emplyees"
    if is_subsequence(&input_lower, info.name) {
      matches.push((info, 5));
    }
  }

  // Stable, so ties keep catalog order
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(info, _)| info).collect()
}
