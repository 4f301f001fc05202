use std::io::{stdin, stdout, Write};
use std::thread::spawn;

use lan_chess::board::{to_string, Board, Square, WIDTH};
use lan_chess::clock::TimeMode;
use lan_chess::config::Settings;
use lan_chess::game::GameStatus;
use lan_chess::network::{self, NetworkHandle};
use lan_chess::session::{thread_clock_ticker, GameView, Role, Session, SessionState};

fn draw_board(board: &Board) {
    print!("  ");
    for col in 0..WIDTH {
        print!(" {}", col);
    }
    println!();
    for (row, line) in to_string(board).lines().enumerate() {
        print!("{} ", row);
        for c in line.chars() {
            print!("|{}", c);
        }
        println!("|");
    }
}

fn draw_view(view: &GameView) {
    let s = &view.snapshot;
    draw_board(&s.board);
    if let Some(clock) = &s.clock {
        println!("White {:.1}s | Black {:.1}s", clock.remaining.white, clock.remaining.black);
    }
    match s.status {
        GameStatus::Playing => {
            let check = if s.in_check[s.turn] { ", check" } else { "" };
            println!("{} to move{}", s.turn, check);
        }
        GameStatus::Checkmate(winner) => println!("Checkmate, {} wins", winner),
        GameStatus::Stalemate => println!("Stalemate"),
        GameStatus::TimedOut(winner) => println!("Time out, {} wins", winner),
    }
    let peer = if view.connected { "connected" } else { "no peer" };
    println!("[{} | {} | {} moves]", view.role, peer, view.history_len);
    for entry in &view.chat {
        println!("  {}: {}", entry.sender, entry.text);
    }
}

fn read_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = stdout().flush();
    let mut line = String::new();
    match stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

fn parse_squares(args: &str) -> Option<Vec<Square>> {
    let numbers: Vec<usize> = args.split_whitespace()
        .map(|t| t.parse::<usize>())
        .collect::<Result<_, _>>()
        .ok()?;
    if numbers.len() % 2 != 0 || numbers.iter().any(|&n| n >= WIDTH) {
        return None;
    }
    Some(numbers.chunks(2).map(|c| (c[0], c[1])).collect())
}

fn print_help() {
    println!("move r c r c | moves r c | chat <text> | board | menu");
}

/// Command loop for one game. Returns when the user goes back to the menu
/// or stdin closes.
fn play(session: &Session) {
    print_help();
    loop {
        let line = match read_line("> ") {
            Some(l) => l,
            None => return,
        };
        let (command, args) = line.split_once(' ').unwrap_or((line.as_str(), ""));
        match command {
            "move" | "m" => match parse_squares(args).as_deref() {
                Some(&[start, end]) => match session.try_move(start, end) {
                    Ok(()) => {}
                    Err(e) => println!("{}", e),
                },
                _ => println!("usage: move r c r c"),
            },
            "moves" => match parse_squares(args).as_deref() {
                Some(&[square]) => match session.legal_moves(square) {
                    Ok(moves) => {
                        let mut moves: Vec<Square> = moves.into_iter().collect();
                        moves.sort();
                        println!("{:?}", moves);
                    }
                    Err(e) => println!("{}", e),
                },
                _ => println!("usage: moves r c"),
            },
            "chat" | "c" => {
                if let Err(e) = session.send_chat(args) {
                    println!("{}", e);
                }
            }
            "board" | "b" | "" => {}
            "menu" | "q" => return,
            _ => {
                print_help();
                continue;
            }
        }
        match session.view() {
            Ok(view) => draw_view(&view),
            Err(e) => {
                log::error!("{}", e);
                return;
            }
        }
    }
}

fn choose_time_mode(settings: &mut Settings) {
    let answer = match read_line(&format!("Time mode [blitz/rapid/standard, default {}]: ", settings.time_mode)) {
        Some(a) => a,
        None => return,
    };
    if answer.is_empty() {
        return;
    }
    match answer.parse::<TimeMode>() {
        Ok(mode) => settings.time_mode = mode,
        Err(e) => println!("{}, keeping {}", e, settings.time_mode),
    }
}

fn run_game(role: Role, settings: &Settings) {
    let session = Session::spawn(SessionState::new(role, settings));
    let network: Option<NetworkHandle> = match role {
        Role::Local => None,
        Role::Host => match network::host(settings, session.sender()) {
            Ok(handle) => {
                println!("Waiting for a client on port {}", handle.local_addr().port());
                Some(handle)
            }
            Err(e) => {
                log::error!("{}", e);
                session.shutdown();
                return;
            }
        },
        Role::Client => {
            let host = match read_line("Host IP: ") {
                Some(h) if !h.is_empty() => h,
                _ => {
                    session.shutdown();
                    return;
                }
            };
            match network::join(&host, settings, session.sender()) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::error!("{}", e);
                    session.shutdown();
                    return;
                }
            }
        }
    };

    let ticker_sender = session.sender();
    let interval = settings.tick_interval;
    spawn(move || thread_clock_ticker(ticker_sender, interval));

    if let Ok(view) = session.view() {
        draw_view(&view);
    }
    play(&session);

    if let Some(handle) = network {
        handle.stop(settings.stop_timeout);
    }
    session.shutdown();
}

fn main() {
    let logger_env = env_logger::Env::default().filter_or("LOG_LEVEL", "INFO");
    env_logger::Builder::from_env(logger_env).format_timestamp_millis().init();

    let settings = Settings::from_env();
    loop {
        println!("1) Host a game  2) Join a game  3) Local game  4) Quit");
        let choice = match read_line("> ") {
            Some(c) => c,
            None => break,
        };
        match choice.as_str() {
            "1" | "host" => {
                let mut settings = settings.clone();
                choose_time_mode(&mut settings);
                run_game(Role::Host, &settings);
            }
            "2" | "join" => run_game(Role::Client, &settings),
            "3" | "local" => {
                let mut settings = settings.clone();
                choose_time_mode(&mut settings);
                run_game(Role::Local, &settings);
            }
            "4" | "quit" | "q" => break,
            _ => {}
        }
    }
    log::info!("Bye");
}
