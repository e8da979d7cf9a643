use crate::io::instance_reader::*;
use crate::io::line_reader::{
    ASSIGN_DIRECTIVE, EQUIP_DIRECTIVE, OPEN_DIRECTIVE, STRIDE_PREFIX,
};
use crate::io::solution_reader::Solution;
use std::io::Write;

/// Writes the instance in the CSV layout it was read from. Triplets keep their
/// original order (duplicates included), so reading the output yields the same values.
pub fn write_instance(instance: &Instance, writer: impl Write) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec![
        SERVICE_COLUMN.to_string(),
        LOCATION_COLUMN.to_string(),
        POINT_COLUMN.to_string(),
        OPENING_COSTS_COLUMN.to_string(),
    ];
    let equip_columns = match &instance.equip_costs {
        EquipCosts::PerService(_) => {
            header.push(EQUIP_COSTS_COLUMN.to_string());
            1
        }
        EquipCosts::PerLocation(_) => {
            header.extend((0..instance.num_services()).map(|f| format!("{EQUIP_COSTS_PREFIX}{f}")));
            instance.num_services() as usize
        }
    };
    csv_writer.write_record(&header)?;

    let num_rows = instance
        .triplets()
        .len()
        .max(instance.opening_costs.len())
        .max(instance.equip_costs.num_rows());

    for row in 0..num_rows {
        let mut record = Vec::with_capacity(header.len());

        match instance.triplets().get(row) {
            Some((_, t)) => record.extend([
                t.service.0.to_string(),
                t.location.0.to_string(),
                t.demand.0.to_string(),
            ]),
            None => record.extend(std::iter::repeat_n(String::new(), 3)),
        }

        record.push(
            instance
                .opening_costs
                .get(row)
                .map(|c| c.to_string())
                .unwrap_or_default(),
        );

        match &instance.equip_costs {
            EquipCosts::PerService(costs) => {
                record.push(costs.get(row).map(|c| c.to_string()).unwrap_or_default())
            }
            EquipCosts::PerLocation(rows) => match rows.get(row) {
                Some(costs) => record.extend(costs.iter().map(|c| c.to_string())),
                None => record.extend(std::iter::repeat_n(String::new(), equip_columns)),
            },
        }

        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Writes metadata lines first, then `open`, `equip` and `assign` directives in index order.
pub fn write_solution(solution: &Solution, mut writer: impl Write) -> std::io::Result<()> {
    for (key, value) in &solution.stride_lines {
        writeln!(writer, "{STRIDE_PREFIX} {key} {value}")?;
    }

    for location in solution.opened() {
        writeln!(writer, "{OPEN_DIRECTIVE} {}", location.0)?;
    }

    for (location, service) in solution.equipped() {
        writeln!(writer, "{EQUIP_DIRECTIVE} {} {}", location.0, service.0)?;
    }

    for (request, (_, location)) in &solution.assignments {
        writeln!(
            writer,
            "{ASSIGN_DIRECTIVE} {} {} {}",
            request.service.0, request.demand.0, location.0
        )?;
    }

    Ok(())
}
