// Copyright 2021 Parity Technologies (UK) Ltd.
// This file is part of quern.

// quern is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// quern is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with quern.  If not, see <http://www.gnu.org/licenses/>.

//! logging

use fern::colors::{Color, ColoredLevelConfig};

/// Initialize a colored stdout logger at `level`, quieting the chattier
/// dependencies. Call once at program start.
pub fn init(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
	let colors = ColoredLevelConfig::new()
		.info(Color::Green)
		.warn(Color::Yellow)
		.error(Color::Red)
		.debug(Color::Blue)
		.trace(Color::Magenta);

	fern::Dispatch::new()
		.level(level)
		.level_for("sqlx", log::LevelFilter::Warn)
		.format(move |out, message, record| {
			out.finish(format_args!(
				"{} {} {} {}",
				chrono::Local::now().format("[%H:%M:%S]"),
				colors.color(record.level()),
				record.target(),
				message,
			))
		})
		.chain(std::io::stdout())
		.apply()
}
