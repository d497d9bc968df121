//! Resource and queue configuration of event steps.

use super::ValidationReport;
use crate::build::Builder;
use crate::config::Limits;
use crate::consts::TRACE_ID_GROUP;
use crate::step::{BuildStepConfig, HandlerConfig, QueueConfig, QueueType, StepType};

/// Highest vCPU allocation allowed for each RAM tier, in MB.
const CPU_TIERS: &[(u32, f64)] = &[
  (1769, 1.0),
  (3538, 2.0),
  (5308, 3.0),
  (7077, 4.0),
  (8846, 5.0),
  (10240, 6.0),
];

pub fn max_cpu_for_ram(ram: u32) -> f64 {
  CPU_TIERS
    .iter()
    .find(|(tier, _)| ram <= *tier)
    .or(CPU_TIERS.last())
    .map(|(_, cpu)| *cpu)
    .unwrap_or(1.0)
}

fn plural(n: u32, unit: &str) -> String {
  if n == 1 { format!("{n} {unit}") } else { format!("{n} {unit}s") }
}

fn check_handler(handler: &HandlerConfig, limits: &Limits) -> Vec<String> {
  let mut problems = Vec::new();

  if let Some(ram) = handler.ram {
    if ram < limits.ram_min_mb {
      problems.push(format!("RAM must be at least {} MB", limits.ram_min_mb));
    } else if ram > limits.ram_max_mb {
      problems.push(format!("RAM cannot exceed {} MB", limits.ram_max_mb));
    }
  }

  if let Some(timeout) = handler.timeout {
    if timeout < limits.timeout_min_secs {
      problems.push(format!("Timeout must be at least {}", plural(limits.timeout_min_secs, "second")));
    } else if timeout > limits.timeout_max_secs {
      problems.push(format!("Timeout cannot exceed {}", plural(limits.timeout_max_secs, "second")));
    }
  }

  if let Some(cpu) = handler.cpu {
    if cpu <= 0.0 {
      problems.push("CPU must be greater than 0".to_string());
    } else {
      // Without RAM the handler gets the lowest tier.
      let ram = handler.ram.unwrap_or(CPU_TIERS[0].0);
      let max = max_cpu_for_ram(ram);
      if cpu > max {
        let source = if handler.ram.is_some() { "" } else { " (RAM not set)" };
        problems.push(format!(
          "CPU value {cpu} is not proportional to RAM: {ram} MB{source} allows at most {max} vCPU"
        ));
      }
    }
  }

  problems
}

fn check_message_group(step: &BuildStepConfig, group: &str) -> Option<String> {
  if group == TRACE_ID_GROUP {
    return None;
  }
  if group.contains(['.', '[', ']']) {
    return Some(format!(
      "messageGroupId '{group}' must be a simple field path (nested and indexed fields are not supported)"
    ));
  }
  let Some(schema) = step.config.input_schema.as_ref() else {
    return Some(format!(
      "Cannot validate messageGroupId '{group}': step has no input schema defined"
    ));
  };
  let declared = schema
    .get("properties")
    .and_then(|p| p.as_object())
    .is_some_and(|p| p.contains_key(group));
  if !declared {
    return Some(format!("messageGroupId '{group}' does not exist in step's input schema"));
  }
  None
}

fn check_queue(step: &BuildStepConfig, queue: &QueueConfig, handler: Option<&HandlerConfig>) -> Vec<String> {
  let mut problems = Vec::new();

  if let Some(retries) = queue.max_retries
    && retries < 0
  {
    problems.push("maxRetries must be greater than or equal to 0".to_string());
  }

  match queue.message_group_id.as_deref() {
    None if queue.queue_type == QueueType::Fifo => {
      problems.push("FIFO queues require a messageGroupId".to_string());
    }
    None => {}
    Some(group) => problems.extend(check_message_group(step, group)),
  }

  if let Some(visibility) = queue.visibility_timeout
    && let Some(timeout) = handler.and_then(|h| h.timeout)
    && visibility <= timeout
  {
    problems.push(format!(
      "Visibility timeout ({visibility}s) must be greater than handler timeout ({timeout}s)"
    ));
  }

  problems
}

/// Only event steps run on their own infrastructure; api and cron steps get a
/// warning when they declare it.
pub fn validate_infrastructure(builder: &Builder) -> ValidationReport {
  let mut report = ValidationReport::default();
  let limits = &builder.config().limits;

  for step in builder.steps().values() {
    let Some(infrastructure) = step.config.infrastructure.as_ref() else {
      continue;
    };

    if step.step_type() != StepType::Event {
      report.warning(
        &step.entrypoint_path,
        step.name(),
        format!(
          "Infrastructure configuration is ignored for {} steps",
          step.step_type()
        ),
      );
      continue;
    }

    let handler = infrastructure.handler.as_ref();
    let mut problems = handler.map(|h| check_handler(h, limits)).unwrap_or_default();
    if let Some(queue) = infrastructure.queue.as_ref() {
      problems.extend(check_queue(step, queue, handler));
    }

    for problem in problems {
      report.error(&step.entrypoint_path, step.name(), problem);
    }
  }

  report
}
