use election_results::db::Database;
use election_results::export::ExportedResults;
use election_results::models::{
    Ballot, BallotChoice, Candidate, Election, ElectionStatus, QuorumPolicy, QuorumType, Voter,
    VotingMethod,
};
use election_results::{ElectionStore, ResultsCache};
use std::collections::BTreeMap;
use std::sync::Arc;

async fn ranked_election(db: &Database) -> (Election, Vec<Candidate>, Vec<Voter>) {
    let mut election = Election::new(
        "Club president".to_string(),
        "Ranked-choice vote".to_string(),
        VotingMethod::Ranked,
        true,
        false,
        true,
        QuorumPolicy {
            kind: QuorumType::Percentage,
            threshold: 50.0,
        },
        120,
    );
    election.status = ElectionStatus::Active;
    db.create_election(&election).await.unwrap();

    let candidates: Vec<Candidate> = ["Alice", "Bob", "Carol"]
        .iter()
        .enumerate()
        .map(|(i, name)| Candidate::new(&election.id, name.to_string(), i as i64 + 1, None))
        .collect();
    for candidate in &candidates {
        db.add_candidate(candidate).await.unwrap();
    }

    let voters: Vec<Voter> = (0..12)
        .map(|i| Voter::new(&election.id, format!("member{}@club.org", i), format!("Member {}", i), 1.0))
        .collect();
    for voter in &voters {
        db.add_voter(voter).await.unwrap();
    }

    (election, candidates, voters)
}

fn ranking(candidates: &[Candidate], order: &[usize]) -> BallotChoice {
    let ranking: BTreeMap<String, u32> = order
        .iter()
        .enumerate()
        .map(|(rank, idx)| (candidates[*idx].id.clone(), rank as u32 + 1))
        .collect();
    BallotChoice::Ranked { ranking }
}

#[tokio::test]
async fn ranked_election_from_ballot_box_to_export() {
    let db = Arc::new(Database::connect("sqlite::memory:", 1).await.unwrap());
    let (election, candidates, voters) = ranked_election(&db).await;

    // Alice 4, Bob 3, Carol 3 first preferences; Bob and Carol go out together.
    let orders: [&[usize]; 10] = [
        &[0],
        &[0, 1],
        &[0, 2],
        &[0],
        &[1, 0],
        &[1, 2],
        &[1, 0],
        &[2, 1],
        &[2, 0],
        &[2],
    ];
    for (voter, order) in voters.iter().zip(orders) {
        let ballot = Ballot::new(&voter.id, &election.id, ranking(&candidates, order));
        db.cast_ballot(&ballot).await.unwrap();
    }
    db.cast_ballot(&Ballot::new(&voters[10].id, &election.id, BallotChoice::Abstain))
        .await
        .unwrap();

    let cache = ResultsCache::new(db.clone());

    let live = cache.get(&election.id).await.unwrap();
    assert!(!cache.is_cached(&election.id));
    assert_eq!(live.statistics.total_votes_cast, 11);
    assert_eq!(live.statistics.abstentions, 1);
    assert!(live.statistics.quorum.reached);

    db.set_status(&election.id, ElectionStatus::Closed).await.unwrap();
    cache.on_election_closed(&election.id).await.unwrap();

    let first = cache.get(&election.id).await.unwrap();
    let second = cache.get(&election.id).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    // One live computation plus the single pinned one
    assert_eq!(cache.computations(), 2);

    let alice = first.candidate(&candidates[0].id).unwrap();
    assert!(alice.is_winner);
    assert_eq!(alice.votes, 4.0);
    assert_eq!(first.rounds.len(), 2);
    assert_eq!(first.rounds[0].eliminated.len(), 2);

    let percent_total: f64 = first.candidates.iter().map(|c| c.percentage).sum::<f64>()
        + first.statistics.abstention_percentage.unwrap();
    assert!((percent_total - 100.0).abs() < 1e-6);

    let exported = ExportedResults::from(&*first);
    assert_eq!(exported.election.quorum_type, Some(QuorumType::Percentage));
    assert_eq!(exported.results.len(), 3);
    assert!(exported.results[0].is_winner);
    assert_eq!(exported.rounds.len(), 2);
}

#[tokio::test]
async fn archived_results_survive_new_ballot_rows() {
    let db = Arc::new(Database::connect("sqlite::memory:", 1).await.unwrap());
    let (election, candidates, voters) = ranked_election(&db).await;
    db.cast_ballot(&Ballot::new(&voters[0].id, &election.id, ranking(&candidates, &[1])))
        .await
        .unwrap();
    db.set_status(&election.id, ElectionStatus::Archived).await.unwrap();

    let cache = ResultsCache::new(db.clone());
    let pinned = cache.get(&election.id).await.unwrap();
    assert!(pinned.candidate(&candidates[1].id).unwrap().is_winner);

    // Even if the store changes underneath, the pinned snapshot is what gets served.
    db.set_status(&election.id, ElectionStatus::Active).await.unwrap();
    db.cast_ballot(&Ballot::new(&voters[1].id, &election.id, ranking(&candidates, &[2])))
        .await
        .unwrap();
    assert_eq!(db.fetch_ballots(&election.id).await.unwrap().len(), 2);

    let again = cache.get(&election.id).await.unwrap();
    assert!(Arc::ptr_eq(&pinned, &again));
    assert_eq!(cache.computations(), 1);
}

#[tokio::test]
async fn unknown_election_reports_not_found() {
    let db = Arc::new(Database::connect("sqlite::memory:", 1).await.unwrap());
    let cache = ResultsCache::new(db);
    let err = cache.get("does-not-exist").await.unwrap_err();
    assert!(matches!(err, election_results::ResultsError::NotFound { .. }));
}
